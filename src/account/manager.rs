/// Account manager over the `account` table
use crate::{
    db::account::{Account, AccountType},
    error::{AppError, AppResult},
};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
}

impl AccountManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create an account; the unique (name, type) index rejects duplicates
    pub async fn create_account(&self, name: &str, account_type: AccountType) -> AppResult<Account> {
        let account = Account {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            account_type,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO account (id, name, account_type, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(account_type.as_i64())
        .bind(account.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::AccountAlreadyExists(name.to_string())
            }
            e => AppError::Database(e),
        })?;

        info!("Created account {} ({:?})", account.id, account_type);

        Ok(account)
    }

    /// Find the account for a verified email
    pub async fn find_account(&self, name: &str, account_type: AccountType) -> AppResult<Account> {
        let row = sqlx::query(
            "SELECT id, name, account_type, created_at FROM account
             WHERE name = ?1 AND account_type = ?2",
        )
        .bind(name)
        .bind(account_type.as_i64())
        .fetch_optional(&self.db)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::AccountNotFound(name.to_string()))?;

        Self::row_to_account(&row)
    }

    /// Get account by id
    pub async fn get_account(&self, id: &str) -> AppResult<Account> {
        let row = sqlx::query("SELECT id, name, account_type, created_at FROM account WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))?;

        Self::row_to_account(&row)
    }

    /// Delete by id, failing when nothing matched
    pub async fn delete_account_by_id(&self, id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM account WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::AccountNotFound(id.to_string()));
        }

        info!("Deleted account {}", id);
        Ok(())
    }

    /// Delete every account type registered under the name
    pub async fn delete_account_by_name(&self, name: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM account WHERE name = ?1")
            .bind(name)
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::AccountNotFound(name.to_string()));
        }

        info!("Deleted {} account(s) by name", result.rows_affected());
        Ok(())
    }

    fn row_to_account(row: &SqliteRow) -> AppResult<Account> {
        let code: i64 = row.get("account_type");
        let account_type = AccountType::from_i64(code)
            .ok_or_else(|| AppError::Internal(format!("Unknown account type {}", code)))?;
        let created_at: DateTime<Utc> = row.get("created_at");

        Ok(Account {
            id: row.get("id"),
            name: row.get("name"),
            account_type,
            created_at,
        })
    }
}
