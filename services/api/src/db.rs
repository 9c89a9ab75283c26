//! Data Access Layer
//!
//! This module contains all the functions for interacting with the PostgreSQL database.
//! Conversation state never lives here; the `calls` table is an audit record
//! of calls placed and their final provider status.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::CallRecord;

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Cheap liveness probe for the status endpoint.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Records a call that is about to be placed.
    pub async fn create_call(
        &self,
        phone_number: &str,
        message: Option<&str>,
        status: &str,
    ) -> Result<CallRecord> {
        let call = sqlx::query_as::<_, CallRecord>(
            r#"
            INSERT INTO calls (phone_number, message, status)
            VALUES ($1, $2, $3)
            RETURNING id, phone_number, message, status, duration, call_sid, created_at, updated_at
            "#,
        )
        .bind(phone_number)
        .bind(message)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(call)
    }

    /// Lists all recorded calls, most recent first.
    pub async fn list_calls(&self) -> Result<Vec<CallRecord>> {
        let calls = sqlx::query_as::<_, CallRecord>(
            r#"
            SELECT id, phone_number, message, status, duration, call_sid, created_at, updated_at
            FROM calls
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(calls)
    }

    /// Retrieves a single call by its record id.
    pub async fn get_call(&self, id: Uuid) -> Result<Option<CallRecord>> {
        let call = sqlx::query_as::<_, CallRecord>(
            r#"
            SELECT id, phone_number, message, status, duration, call_sid, created_at, updated_at
            FROM calls
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(call)
    }

    /// Retrieves a single call by the telephony provider's call sid.
    pub async fn get_call_by_sid(&self, call_sid: &str) -> Result<Option<CallRecord>> {
        let call = sqlx::query_as::<_, CallRecord>(
            r#"
            SELECT id, phone_number, message, status, duration, call_sid, created_at, updated_at
            FROM calls
            WHERE call_sid = $1
            "#,
        )
        .bind(call_sid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(call)
    }

    /// Attaches the provider's sid to a freshly placed call.
    pub async fn set_call_sid(&self, id: Uuid, call_sid: &str, status: &str) -> Result<CallRecord> {
        let call = sqlx::query_as::<_, CallRecord>(
            r#"
            UPDATE calls
            SET call_sid = $2, status = $3, updated_at = now()
            WHERE id = $1
            RETURNING id, phone_number, message, status, duration, call_sid, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(call_sid)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(call)
    }

    /// Updates a call's provider status, keeping the stored duration when the
    /// callback did not carry one.
    pub async fn update_call_status(
        &self,
        id: Uuid,
        status: &str,
        duration: Option<i32>,
    ) -> Result<CallRecord> {
        let call = sqlx::query_as::<_, CallRecord>(
            r#"
            UPDATE calls
            SET status = $2, duration = COALESCE($3, duration), updated_at = now()
            WHERE id = $1
            RETURNING id, phone_number, message, status, duration, call_sid, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(duration)
        .fetch_one(&self.pool)
        .await?;
        Ok(call)
    }
}
