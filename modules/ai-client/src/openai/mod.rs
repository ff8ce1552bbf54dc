mod client;
pub(crate) mod types;

use async_trait::async_trait;

use crate::error::AiError;
use crate::traits::EmbedAgent;

use client::OpenAiClient;

// =============================================================================
// OpenAi (embeddings endpoint; also used for Voyage's compatible API)
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    embedding_model: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            embedding_model: "text-embedding-3-small".to_string(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn client(&self) -> OpenAiClient {
        let client = OpenAiClient::new(&self.api_key, self.http.clone());
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }
}

#[async_trait]
impl EmbedAgent for OpenAi {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        self.client()
            .embed_batch(&self.embedding_model, &[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(AiError::EmptyResponse("embeddings"))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.client().embed_batch(&self.embedding_model, &texts).await
    }
}
