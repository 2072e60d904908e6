//! Database module

mod schema;
mod write_buffer;

pub use write_buffer::{start_write_buffer, TrackingJob, WriteSender};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::config::DatabaseConfig;

/// One recorded page view. Never updated once written.
#[derive(Debug, Clone)]
pub struct Visit {
    pub path: String,
    pub ip_hash: String,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Visit {
    pub fn new(path: String, ip_hash: String, user_agent: Option<String>) -> Self {
        Self {
            path,
            ip_hash,
            user_agent,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub category: String,
    pub image: Option<String>,
    pub published: bool,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

type ArticleRow = (String, String, String, String, Option<String>, String, Option<String>, bool, i64, i64, i64);

const ARTICLE_COLUMNS: &str =
    "id, title, slug, content, excerpt, category, image, published, views, created_at, updated_at";

fn millis_to_utc(ms: i64, column: &str) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .with_context(|| format!("corrupt {} timestamp {}", column, ms))
}

impl TryFrom<ArticleRow> for Article {
    type Error = anyhow::Error;

    fn try_from(row: ArticleRow) -> Result<Self> {
        let (id, title, slug, content, excerpt, category, image, published, views, created_at, updated_at) = row;
        Ok(Article {
            id: Uuid::parse_str(&id).with_context(|| format!("corrupt article id '{}'", id))?,
            title,
            slug,
            content,
            excerpt,
            category,
            image,
            published,
            views,
            created_at: millis_to_utc(created_at, "created_at")?,
            updated_at: millis_to_utc(updated_at, "updated_at")?,
        })
    }
}

/// Visits on one UTC calendar day, labelled `MM-DD`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyVisits {
    pub date: String,
    pub visits: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopArticle {
    pub id: Uuid,
    pub title: String,
    pub views: i64,
    pub category: String,
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", config.url)).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        // Enable WAL mode for better concurrency
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;

        for statement in [
            schema::CREATE_VISITS_TABLE,
            schema::CREATE_ARTICLES_TABLE,
            schema::CREATE_INDEX_VISITS_TIMESTAMP,
            schema::CREATE_INDEX_ARTICLES_VIEWS,
            schema::CREATE_INDEX_ARTICLES_PUBLISHED,
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to be returned
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn insert_visit(&self, visit: &Visit) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO visits (path, ip_hash, user_agent, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(&visit.path)
        .bind(&visit.ip_hash)
        .bind(&visit.user_agent)
        .bind(visit.timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Insert a batch of visits in a single transaction
    pub async fn batch_insert_visits(&self, visits: &[Visit]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for visit in visits {
            sqlx::query(
                "INSERT INTO visits (path, ip_hash, user_agent, timestamp) VALUES (?, ?, ?, ?)",
            )
            .bind(&visit.path)
            .bind(&visit.ip_hash)
            .bind(&visit.user_agent)
            .bind(visit.timestamp.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Add one to an article's view counter. Returns false when no such article exists.
    pub async fn increment_article_views(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE articles SET views = views + 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_visits(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM visits")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn count_visits_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM visits WHERE timestamp >= ?")
            .bind(since.timestamp_millis())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Visit counts grouped by UTC day, oldest first. Days without visits are not returned.
    pub async fn visits_per_day(&self, since: DateTime<Utc>) -> Result<Vec<DailyVisits>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT strftime('%Y-%m-%d', timestamp / 1000, 'unixepoch') AS day, COUNT(*) AS visits
            FROM visits
            WHERE timestamp >= ?
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(day, visits)| {
                let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                    .with_context(|| format!("unexpected day bucket '{}'", day))?;
                Ok(DailyVisits {
                    date: date.format("%m-%d").to_string(),
                    visits,
                })
            })
            .collect()
    }

    pub async fn top_articles(&self, limit: i64) -> Result<Vec<TopArticle>> {
        let rows: Vec<(String, String, i64, String)> = sqlx::query_as(
            r#"
            SELECT id, title, views, category
            FROM articles
            ORDER BY views DESC, created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, title, views, category)| {
                Ok(TopArticle {
                    id: Uuid::parse_str(&id).with_context(|| format!("corrupt article id '{}'", id))?,
                    title,
                    views,
                    category,
                })
            })
            .collect()
    }

    pub async fn list_published_articles(&self) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM articles WHERE published = 1 ORDER BY created_at DESC",
            ARTICLE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Article::try_from).collect()
    }

    pub async fn get_article(&self, id: Uuid) -> Result<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM articles WHERE id = ?",
            ARTICLE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Article::try_from).transpose()
    }
}
