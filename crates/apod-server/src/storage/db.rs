//! SQLite database layer (embedded, no external dependencies)

use anyhow::{Context, Result};
use apod_types::Record;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        tracing::info!("Opening SQLite database at: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true);

        if is_in_memory(database_url) {
            tracing::warn!("Using an in-memory database, records are lost on exit");
            let pool = memory_pool_options(5)
                .connect_with(options)
                .await
                .context("Failed to open in-memory database")?;
            return Self::from_pool(pool).await;
        }

        let options = options
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // Create parent directory if needed
        let filename = options.clone().get_filename();
        if let Some(parent) = filename.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database at: {}", database_url))?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database, kept alive on a single connection
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = memory_pool_options(1).connect_with(options).await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        tracing::info!("Database connection established, creating schema...");

        Self::create_schema(&pool)
            .await
            .context("Failed to create database schema")?;

        tracing::info!("Database initialization complete");

        Ok(Self { pool })
    }

    async fn create_schema(pool: &SqlitePool) -> Result<()> {
        // AUTOINCREMENT keeps ids monotonic and never reused after a delete
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT,
                explanation TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn list_records(&self) -> sqlx::Result<Vec<Record>> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, date, explanation, title, url
            FROM records
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub async fn get_record(&self, id: i64) -> sqlx::Result<Option<Record>> {
        let row: Option<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, date, explanation, title, url
            FROM records WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    /// Insert a record and return the stored row
    pub async fn create_record(&self, record: &Record) -> sqlx::Result<Record> {
        let row: RecordRow = sqlx::query_as(
            r#"
            INSERT INTO records (date, explanation, title, url)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, date, explanation, title, url
            "#,
        )
        .bind(record.date)
        .bind(&record.explanation)
        .bind(&record.title)
        .bind(&record.url)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created record {}", row.id);
        Ok(row.into())
    }

    /// Insert only explanation, title and url from an upstream payload
    pub async fn insert_ingested(&self, record: &Record) -> sqlx::Result<Record> {
        let row: RecordRow = sqlx::query_as(
            r#"
            INSERT INTO records (explanation, title, url)
            VALUES (?1, ?2, ?3)
            RETURNING id, date, explanation, title, url
            "#,
        )
        .bind(&record.explanation)
        .bind(&record.title)
        .bind(&record.url)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// Set explanation and title. Returns false when no row has `id`.
    pub async fn update_record(&self, id: i64, record: &Record) -> sqlx::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE records SET explanation = ?1, title = ?2
            WHERE id = ?3
            "#,
        )
        .bind(&record.explanation)
        .bind(&record.title)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns false when no row has `id`
    pub async fn delete_record(&self, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM records WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// An in-memory database lives only as long as one of its connections, so
/// the pool must never close its last one.
fn memory_pool_options(max_connections: u32) -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}

// Helper struct for sqlx query_as
#[derive(sqlx::FromRow)]
struct RecordRow {
    id: i64,
    date: Option<NaiveDate>,
    explanation: String,
    title: String,
    url: String,
}

impl From<RecordRow> for Record {
    fn from(r: RecordRow) -> Self {
        let record = Record::new(r.explanation, r.title, r.url).with_id(r.id);
        match r.date {
            Some(date) => record.with_date(date),
            None => record,
        }
    }
}
