/// Single-use login correlation states
///
/// A state is issued when the login redirect is built and consumed exactly
/// once when the identity provider calls back. Consumption is one
/// conditional `DELETE ... RETURNING`, so two concurrent callbacks carrying
/// the same state cannot both succeed.
use crate::{
    db::account::CorrelationState,
    error::{AppError, AppResult},
};
use chrono::Utc;
use rand::RngCore;
use sqlx::SqlitePool;
use tracing::debug;

/// Persisted store of outstanding correlation states
pub struct StateStore {
    db: SqlitePool,
    ttl_secs: i64,
}

impl StateStore {
    pub fn new(db: SqlitePool, ttl_secs: i64) -> Self {
        Self { db, ttl_secs }
    }

    /// Issue and persist a fresh state
    pub async fn create_state(&self, return_to: &str, signup: bool) -> AppResult<CorrelationState> {
        let now = Utc::now().timestamp();
        let state = CorrelationState {
            state: generate_state_token(),
            return_to: return_to.to_string(),
            signup,
            created_at: now,
            expires_at: now + self.ttl_secs,
        };

        sqlx::query(
            "INSERT INTO oauth_state (state, return_to, signup, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&state.state)
        .bind(&state.return_to)
        .bind(state.signup)
        .bind(state.created_at)
        .bind(state.expires_at)
        .execute(&self.db)
        .await
        .map_err(AppError::Database)?;

        debug!("Issued login state (signup: {})", signup);

        Ok(state)
    }

    /// Remove and return the state if it exists and has not expired
    ///
    /// `Ok(None)` is the normal answer for unknown, expired or already used
    /// states.
    pub async fn find_and_consume(&self, token: &str) -> AppResult<Option<CorrelationState>> {
        let now = Utc::now().timestamp();

        let state = sqlx::query_as::<_, CorrelationState>(
            "DELETE FROM oauth_state
             WHERE state = ?1 AND expires_at > ?2
             RETURNING state, return_to, signup, created_at, expires_at",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .map_err(AppError::Database)?;

        Ok(state)
    }

    /// Drop states whose lifetime has passed, returning how many were removed
    pub async fn cleanup_expired(&self) -> AppResult<u64> {
        let now = Utc::now().timestamp();

        let result = sqlx::query("DELETE FROM oauth_state WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}

/// Hex encoding of 64 random bits
fn generate_state_token() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
