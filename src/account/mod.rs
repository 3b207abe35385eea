/// Account directory
///
/// Maps verified identity-provider emails to account records. One account
/// exists per (name, account type).

mod manager;

pub use crate::db::account::{Account, AccountType};
pub use manager::AccountManager;

use serde::{Deserialize, Serialize};

/// Query for deleting an account by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAccountQuery {
    pub name: String,
}

/// Account as returned over HTTP
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            account_type: account.account_type,
        }
    }
}
