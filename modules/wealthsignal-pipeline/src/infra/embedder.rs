use ai_client::openai::OpenAi;
use ai_client::traits::EmbedAgent;
use anyhow::Result;

use crate::traits::TextEmbedder;

const VOYAGE_BASE_URL: &str = "https://api.voyageai.com/v1";
const VOYAGE_MODEL: &str = "voyage-3-large";

/// Voyage AI embeddings via the OpenAI-compatible API.
pub struct Embedder {
    client: OpenAi,
}

impl Embedder {
    pub fn new(voyage_api_key: &str) -> Self {
        let client = OpenAi::new(voyage_api_key)
            .with_base_url(VOYAGE_BASE_URL)
            .with_embedding_model(VOYAGE_MODEL);
        Self { client }
    }
}

#[async_trait::async_trait]
impl TextEmbedder for Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.client.embed(text).await?)
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(self.client.embed_batch(texts).await?)
    }
}
