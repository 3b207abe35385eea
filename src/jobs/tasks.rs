/// Background task implementations
use crate::{context::AppContext, error::AppResult};

/// Remove correlation states whose lifetime has passed
pub async fn cleanup_expired_states(ctx: &AppContext) -> AppResult<u64> {
    ctx.state_store.cleanup_expired().await
}

/// Health check - verify the database answers
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}
