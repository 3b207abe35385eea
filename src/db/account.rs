/// Persisted records for sign-in: accounts and login correlation states
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kind of identity an account is federated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Keycloak,
}

impl AccountType {
    /// Integer code stored in the `account_type` column
    pub fn as_i64(self) -> i64 {
        match self {
            AccountType::Keycloak => 0,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(AccountType::Keycloak),
            _ => None,
        }
    }
}

/// Account record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
}

/// Correlates an outbound login redirect with its callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CorrelationState {
    pub state: String,
    pub return_to: String,
    pub signup: bool,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds
    pub expires_at: i64,
}
