// Postgres persistence. Each document is a JSONB `doc` column keyed by its
// natural key; vectors live in their own table and are written separately.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use wealthsignal_common::{
    normalize_name, Article, Opportunity, SourceConfig, Subscriber, SynthesizedEvent,
};

use crate::error::Result;
use crate::traits::{DocumentStore, RunRecord, UpsertOutcome, VectorIndex, VectorRecord};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        info!("Connected to Postgres");
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn active_sources(&self) -> Result<Vec<SourceConfig>> {
        let rows = sqlx::query_scalar::<_, Json<SourceConfig>>(
            r#"
            SELECT doc FROM sources
            WHERE doc->>'status' = 'active'
            ORDER BY key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(s)| s).collect())
    }

    async fn record_source_scrape(&self, key: &str, success: bool, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sources SET
                doc = doc || jsonb_build_object(
                    'last_scraped_at', to_jsonb($2::timestamptz),
                    'last_success_at',
                        CASE WHEN $3 THEN to_jsonb($2::timestamptz)
                             ELSE COALESCE(doc->'last_success_at', 'null'::jsonb) END,
                    'consecutive_failures',
                        CASE WHEN $3 THEN 0
                             ELSE COALESCE((doc->>'consecutive_failures')::int, 0) + 1 END
                ),
                updated_at = $2
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(at)
        .bind(success)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_articles_by_links(&self, links: &[String]) -> Result<Vec<Article>> {
        if links.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_scalar::<_, Json<Article>>(
            r#"
            SELECT doc || jsonb_build_object('id', id) FROM articles
            WHERE link = ANY($1)
            "#,
        )
        .bind(links)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(a)| a).collect())
    }

    async fn find_articles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Article>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_scalar::<_, Json<Article>>(
            r#"
            SELECT doc || jsonb_build_object('id', id) FROM articles
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(a)| a).collect())
    }

    async fn upsert_article(&self, article: &Article) -> Result<()> {
        // Embeddings are kept in article_vectors only.
        let mut doc = article.clone();
        doc.embedding = None;

        sqlx::query(
            r#"
            INSERT INTO articles (link, id, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (link) DO UPDATE SET
                doc = EXCLUDED.doc || jsonb_build_object(
                    'id', articles.id,
                    'created_at', articles.doc->'created_at'
                ),
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&doc.link)
        .bind(doc.id)
        .bind(Json(&doc))
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_event(&self, event: &SynthesizedEvent) -> Result<UpsertOutcome> {
        let row: (Uuid, bool, bool) = sqlx::query_as(
            r#"
            INSERT INTO synthesized_events (event_key, id, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_key) DO UPDATE SET
                doc = EXCLUDED.doc || jsonb_build_object(
                    'id', synthesized_events.id,
                    'created_at', synthesized_events.doc->'created_at',
                    'emailed', COALESCE(synthesized_events.doc->'emailed', 'false'::jsonb),
                    'email_sent_at', COALESCE(synthesized_events.doc->'email_sent_at', 'null'::jsonb)
                ),
                updated_at = EXCLUDED.updated_at
            RETURNING id, (xmax = 0) AS inserted, COALESCE((doc->>'emailed')::boolean, false)
            "#,
        )
        .bind(&event.event_key)
        .bind(event.id)
        .bind(Json(event))
        .bind(event.created_at)
        .bind(event.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(UpsertOutcome {
            id: row.0,
            inserted: row.1,
            emailed: row.2,
        })
    }

    async fn upsert_opportunity(&self, opportunity: &Opportunity) -> Result<Opportunity> {
        let key = normalize_name(&opportunity.reach_out_to);
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_scalar::<_, Json<Opportunity>>(
            "SELECT doc FROM opportunities WHERE name_key = $1 FOR UPDATE",
        )
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await?;

        let stored = match existing {
            Some(Json(mut current)) => {
                current.merge_discovery(opportunity);
                current
            }
            None => opportunity.clone(),
        };

        sqlx::query(
            r#"
            INSERT INTO opportunities (name_key, id, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name_key) DO UPDATE SET
                doc = EXCLUDED.doc,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&key)
        .bind(stored.id)
        .bind(Json(&stored))
        .bind(stored.created_at)
        .bind(stored.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn link_opportunity_to_event(&self, reach_out_to: &str, event_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE opportunities
            SET doc = jsonb_set(doc, '{source_event_id}', to_jsonb($2::uuid)), updated_at = now()
            WHERE name_key = $1
            "#,
        )
        .bind(normalize_name(reach_out_to))
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_events_emailed(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE synthesized_events
            SET doc = doc || jsonb_build_object('emailed', true, 'email_sent_at', to_jsonb($2::timestamptz)),
                updated_at = $2
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_opportunities_emailed(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE opportunities
            SET doc = doc || jsonb_build_object('emailed', true, 'email_sent_at', to_jsonb($2::timestamptz)),
                updated_at = $2
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_subscribers(&self) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query_scalar::<_, Json<Subscriber>>(
            "SELECT doc FROM subscribers WHERE (doc->>'is_active')::boolean",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(s)| s).collect())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pipeline_runs (run_id, started_at, finished_at, outcome, stats)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (run_id) DO UPDATE SET
                finished_at = EXCLUDED.finished_at,
                outcome = EXCLUDED.outcome,
                stats = EXCLUDED.stats
            "#,
        )
        .bind(run.run_id)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(&run.outcome)
        .bind(&run.stats)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for PgStore {
    async fn upsert_vector(
        &self,
        id: Uuid,
        vector: &[f32],
        metadata: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO article_vectors (article_id, vector, metadata, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (article_id) DO UPDATE SET
                vector = EXCLUDED.vector,
                metadata = EXCLUDED.metadata,
                updated_at = now()
            "#,
        )
        .bind(id)
        .bind(vector)
        .bind(&metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn vectors(&self) -> Result<Vec<VectorRecord>> {
        let rows: Vec<(Uuid, Vec<f32>, serde_json::Value)> =
            sqlx::query_as("SELECT article_id, vector, metadata FROM article_vectors")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, vector, metadata)| VectorRecord {
                id,
                vector,
                metadata,
            })
            .collect())
    }
}
