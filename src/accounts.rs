use std::collections::HashSet;

use serde::Serialize;

use crate::{db, errors::AppError, structs::Patron, AppState};

#[derive(Serialize, Debug, Clone)]
pub struct AccountAccess {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<&Patron> for AccountAccess {
    fn from(patron: &Patron) -> Self {
        AccountAccess {
            id: patron.id,
            name: patron.display_name(),
            email: patron.email.clone(),
        }
    }
}

/// Accounts a patron may act on behalf of: their own plus every account
/// they are a household member of.
#[derive(Serialize, Debug, Clone)]
pub struct AccountInfo {
    pub user_id: i64,
    pub own_account: AccountAccess,
    pub household_accounts: Vec<AccountAccess>,
    pub accessible_accounts: Vec<AccountAccess>,
}

impl AccountInfo {
    pub fn accessible_ids(&self) -> HashSet<i64> {
        self.accessible_accounts.iter().map(|a| a.id).collect()
    }
}

/// Resolves the accessible-account set for a patron. One broken household
/// edge is logged and skipped; only a missing root account yields None.
pub async fn resolve_account_info(
    state: &AppState,
    user_id: i64,
) -> Result<Option<AccountInfo>, AppError> {
    let Some(patron) = db::get_patron_by_id(state, user_id).await? else {
        return Ok(None);
    };
    let own_account = AccountAccess::from(&patron);

    let mut household_accounts = Vec::new();
    for owner_id in db::owner_ids_for_member(state, user_id).await? {
        match db::get_patron_by_id(state, owner_id).await {
            Ok(Some(owner)) => household_accounts.push(AccountAccess::from(&owner)),
            Ok(None) => {
                log::warn!("Household account {} referenced but missing", owner_id);
            }
            Err(e) => {
                log::error!("Error fetching household account {}: {}", owner_id, e);
            }
        }
    }

    let mut accessible_accounts = vec![own_account.clone()];
    accessible_accounts.extend(household_accounts.iter().cloned());

    Ok(Some(AccountInfo {
        user_id,
        own_account,
        household_accounts,
        accessible_accounts,
    }))
}

/// Allow iff the target is the caller itself or appears in the caller's
/// accessible set. A session without a resolved set falls back to self-only
/// access. Evaluated fresh on every call; membership can change between
/// requests.
pub fn authorize(
    requesting_account_id: i64,
    target_account_id: i64,
    accessible: Option<&HashSet<i64>>,
) -> bool {
    if target_account_id == requesting_account_id {
        return true;
    }
    match accessible {
        Some(set) => set.contains(&target_account_id),
        None => false,
    }
}
