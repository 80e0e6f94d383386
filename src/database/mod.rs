//! SQLite sink for scraped articles.
//!
//! The engine never touches storage; this is the persistence collaborator the
//! binary wires behind it. Rows are keyed by the article dedup key, so
//! re-saving an article from a later run is a no-op.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::models::Article;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            if let Some(parent) = db_url
                .strip_prefix("sqlite:")
                .map(|path| path.trim_start_matches("//"))
                .and_then(|path| Path::new(path).parent())
                .filter(|parent| !parent.as_os_str().is_empty())
            {
                tokio::fs::create_dir_all(parent).await?;
            }

            // Create database file if it doesn't exist
            if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
                info!(db_url, "Creating database file");
                Sqlite::create_database(db_url).await?;
            }
        }

        // A single connection keeps an in-memory database alive and shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect(db_url)
            .await?;

        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    /// Dedup keys of every stored article, the baseline for `new_count`.
    pub async fn existing_keys(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT dedup_key FROM articles")
            .fetch_all(&self.pool)
            .await?;

        let keys = rows
            .into_iter()
            .map(|row| row.get::<String, _>("dedup_key"))
            .collect();

        Ok(keys)
    }

    /// Insert articles not stored yet; returns how many rows were added.
    pub async fn save_articles(&self, articles: &[Article]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for article in articles {
            let tags = serde_json::to_string(&article.tags)?;
            let result = sqlx::query(
                r"
                INSERT INTO articles
                    (id, dedup_key, article_url, headline, publisher, source, view,
                     published_time, image_url, tags, summary, scraped_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(article.id())
            .bind(article.dedup_key())
            .bind(&article.article_url)
            .bind(&article.headline)
            .bind(&article.publisher)
            .bind(&article.source)
            .bind(&article.view)
            .bind(&article.published_time)
            .bind(&article.image_url)
            .bind(tags)
            .bind(&article.summary)
            .bind(article.scraped_at)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("total"))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn article(headline: &str, url: &str) -> Article {
        Article {
            headline: headline.to_string(),
            article_url: url.to_string(),
            publisher: "Wire".to_string(),
            source: "daily".to_string(),
            view: "top".to_string(),
            published_time: None,
            image_url: None,
            tags: vec!["world".to_string()],
            summary: None,
            scraped_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_is_idempotent_by_dedup_key() {
        let db = Database::new("sqlite::memory:").await.unwrap();

        let first = vec![article("A", "https://x.test/a"), article("B", "https://x.test/b")];
        assert_eq!(db.save_articles(&first).await.unwrap(), 2);

        let again = vec![article("A corrected", "https://x.test/a"), article("C", "")];
        assert_eq!(db.save_articles(&again).await.unwrap(), 1);
        assert_eq!(db.count().await.unwrap(), 3);

        let keys = db.existing_keys().await.unwrap();
        assert!(keys.contains("https://x.test/a"));
        assert!(keys.contains("C"));
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("nested/news.db").display());

        let db = Database::new(&url).await.unwrap();
        assert_eq!(db.count().await.unwrap(), 0);
        assert!(dir.path().join("nested/news.db").exists());
    }
}
