use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, instrument};

use super::{Collection, Document, DocumentStream, Pinger, StoreError, StoreResult};
use crate::config::DatabaseConfig;
use crate::projects::repo_types::Project;
use crate::users::repo_types::User;

/// Both collections live in one Postgres database and share its pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects, verifies the server answers and creates the schema. Any
    /// failure here is fatal for the process.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.ping_timeout())
            .connect(&config.url)
            .await
            .context("connect to database")?;

        let store = Self { pool };
        store
            .ping(config.ping_timeout())
            .await
            .context("ping database")?;

        sqlx::migrate!("./migrations")
            .run(&store.pool)
            .await
            .context("create schema")?;
        info!("database schema ready");

        Ok(store)
    }
}

fn map_write_error<D: Document>(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict {
            collection: D::COLLECTION,
            detail: db_err
                .constraint()
                .map(str::to_string)
                .unwrap_or_else(|| db_err.message().to_string()),
        },
        other => StoreError::transient(other),
    }
}

fn not_found<D: Document>(key: &str) -> StoreError {
    StoreError::NotFound {
        collection: D::COLLECTION,
        key: key.to_string(),
    }
}

#[async_trait]
impl Collection<User> for PgStore {
    #[instrument(skip(self))]
    async fn find_by_key(&self, key: &str) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT email, first_name, last_name, location, password
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::transient)?
        .ok_or_else(|| not_found::<User>(key))
    }

    #[instrument(skip(self, doc), fields(email = %doc.email))]
    async fn insert_unique(&self, doc: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (email, first_name, last_name, location, password)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&doc.email)
        .bind(&doc.first_name)
        .bind(&doc.last_name)
        .bind(&doc.location)
        .bind(&doc.password)
        .execute(&self.pool)
        .await
        .map_err(map_write_error::<User>)?;
        Ok(())
    }

    #[instrument(skip(self, doc))]
    async fn update_by_key(&self, key: &str, doc: &User) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET first_name = $2, last_name = $3, location = $4, password = $5
             WHERE email = $1
            "#,
        )
        .bind(key)
        .bind(&doc.first_name)
        .bind(&doc.last_name)
        .bind(&doc.location)
        .bind(&doc.password)
        .execute(&self.pool)
        .await
        .map_err(map_write_error::<User>)?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn delete_by_key(&self, key: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(StoreError::transient)?;
        if result.rows_affected() == 0 {
            return Err(not_found::<User>(key));
        }
        Ok(())
    }

    fn list_all(&self) -> DocumentStream<'_, User> {
        sqlx::query_as::<_, User>(
            "SELECT email, first_name, last_name, location, password FROM users",
        )
        .fetch(&self.pool)
        .map_err(StoreError::transient)
        .boxed()
    }
}

#[async_trait]
impl Collection<Project> for PgStore {
    #[instrument(skip(self))]
    async fn find_by_key(&self, key: &str) -> StoreResult<Project> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, description, tags, tag_line, members, photo,
                   application_area, winner, winner_type, hackathon, year
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::transient)?
        .ok_or_else(|| not_found::<Project>(key))
    }

    #[instrument(skip(self, doc), fields(id = %doc.id, name = %doc.name))]
    async fn insert_unique(&self, doc: &Project) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, description, tags, tag_line, members, photo,
                                  application_area, winner, winner_type, hackathon, year)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.name)
        .bind(&doc.description)
        .bind(doc.tags.clone())
        .bind(&doc.tag_line)
        .bind(doc.members.clone())
        .bind(&doc.photo)
        .bind(doc.application_area.clone())
        .bind(doc.winner)
        .bind(&doc.winner_type)
        .bind(&doc.hackathon)
        .bind(doc.year)
        .execute(&self.pool)
        .await
        .map_err(map_write_error::<Project>)?;
        Ok(())
    }

    #[instrument(skip(self, doc))]
    async fn update_by_key(&self, key: &str, doc: &Project) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE projects
               SET name = $2, description = $3, tags = $4, tag_line = $5, members = $6,
                   photo = $7, application_area = $8, winner = $9, winner_type = $10,
                   hackathon = $11, year = $12
             WHERE id = $1
            "#,
        )
        .bind(key)
        .bind(&doc.name)
        .bind(&doc.description)
        .bind(doc.tags.clone())
        .bind(&doc.tag_line)
        .bind(doc.members.clone())
        .bind(&doc.photo)
        .bind(doc.application_area.clone())
        .bind(doc.winner)
        .bind(&doc.winner_type)
        .bind(&doc.hackathon)
        .bind(doc.year)
        .execute(&self.pool)
        .await
        .map_err(map_write_error::<Project>)?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn delete_by_key(&self, key: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(StoreError::transient)?;
        if result.rows_affected() == 0 {
            return Err(not_found::<Project>(key));
        }
        Ok(())
    }

    fn list_all(&self) -> DocumentStream<'_, Project> {
        sqlx::query_as::<_, Project>(
            "SELECT id, name, description, tags, tag_line, members, photo, \
             application_area, winner, winner_type, hackathon, year FROM projects",
        )
        .fetch(&self.pool)
        .map_err(StoreError::transient)
        .boxed()
    }
}

#[async_trait]
impl Pinger for PgStore {
    async fn ping(&self, timeout: Duration) -> StoreResult<()> {
        match tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(&self.pool)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(StoreError::transient(e)),
            Err(_) => Err(StoreError::Transient {
                message: format!("ping timed out after {}ms", timeout.as_millis()),
            }),
        }
    }
}
