use serde::Serialize;

use crate::{db, errors::AppError, structs::Patron, utils, AppState};

#[derive(Serialize, Debug, Clone)]
pub struct HouseholdMember {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: String,
}

impl From<Patron> for HouseholdMember {
    fn from(p: Patron) -> Self {
        HouseholdMember {
            id: p.id,
            email: p.email,
            first_name: p.first_name,
            last_name: p.last_name,
            created_at: p.created_at,
        }
    }
}

pub async fn list_members(
    state: &AppState,
    owner_id: i64,
) -> Result<Vec<HouseholdMember>, AppError> {
    let members = db::members_of_owner(state, owner_id).await?;
    Ok(members.into_iter().map(HouseholdMember::from).collect())
}

/// Creates a new account with access to the owner's inventory. The member
/// authenticates with its own credentials; the owner only picks the initial
/// password.
pub async fn grant(
    state: &AppState,
    owner_id: i64,
    email: &str,
    password: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<Patron, AppError> {
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_owned(),
        ));
    }
    if password.len() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".to_owned(),
        ));
    }

    let email = email.to_lowercase();
    if db::get_patron_by_email(state, &email).await?.is_some() {
        return Err(AppError::DuplicateAccount);
    }

    let pwd_hash = utils::hash_password(password)?;
    let member = db::create_patron(
        state,
        &email,
        &pwd_hash,
        first_name.filter(|s| !s.is_empty()),
        last_name.filter(|s| !s.is_empty()),
        Some(owner_id),
    )
    .await?;
    db::add_household_edge(state, member.id, owner_id).await?;
    Ok(member)
}

/// Removes exactly the invoking owner's edge from the member's edge set.
/// The member account itself stays, even with an empty edge set.
pub async fn revoke(state: &AppState, owner_id: i64, member_id: i64) -> Result<(), AppError> {
    let member = db::get_patron_by_id(state, member_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let owners = db::owner_ids_for_member(state, member.id).await?;
    if !owners.contains(&owner_id) {
        return Err(AppError::Unauthorized);
    }

    db::remove_household_edge(state, member.id, owner_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[actix_web::test]
    async fn grant_creates_member_with_single_edge() {
        let state = test_support::state().await;
        let owner = test_support::patron(&state, "owner@example.com").await;

        let member = grant(&state, owner.id, "Kid@Example.com", "secret1", Some("Kid"), None)
            .await
            .unwrap();
        assert_eq!(member.email, "kid@example.com");
        assert_eq!(member.created_by, Some(owner.id));
        let owners = db::owner_ids_for_member(&state, member.id).await.unwrap();
        assert_eq!(owners, vec![owner.id]);
    }

    #[actix_web::test]
    async fn grant_rejects_short_password() {
        let state = test_support::state().await;
        let owner = test_support::patron(&state, "owner@example.com").await;

        let err = grant(&state, owner.id, "kid@example.com", "12345", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[actix_web::test]
    async fn grant_twice_yields_duplicate_account() {
        let state = test_support::state().await;
        let owner = test_support::patron(&state, "owner@example.com").await;

        grant(&state, owner.id, "kid@example.com", "secret1", None, None)
            .await
            .unwrap();
        let err = grant(&state, owner.id, "kid@example.com", "secret1", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateAccount));
    }

    #[actix_web::test]
    async fn grant_then_revoke_restores_edge_set() {
        let state = test_support::state().await;
        let owner = test_support::patron(&state, "owner@example.com").await;

        let member = grant(&state, owner.id, "kid@example.com", "secret1", None, None)
            .await
            .unwrap();
        revoke(&state, owner.id, member.id).await.unwrap();

        let owners = db::owner_ids_for_member(&state, member.id).await.unwrap();
        assert!(owners.is_empty());
        // the member account itself survives
        assert!(db::get_patron_by_id(&state, member.id)
            .await
            .unwrap()
            .is_some());
    }

    #[actix_web::test]
    async fn revoke_without_edge_is_unauthorized() {
        let state = test_support::state().await;
        let owner = test_support::patron(&state, "owner@example.com").await;
        let stranger = test_support::patron(&state, "stranger@example.com").await;

        let err = revoke(&state, owner.id, stranger.id).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[actix_web::test]
    async fn revoke_removes_only_the_invoking_owner() {
        let state = test_support::state().await;
        let owner_a = test_support::patron(&state, "a@example.com").await;
        let owner_b = test_support::patron(&state, "b@example.com").await;

        let member = grant(&state, owner_a.id, "kid@example.com", "secret1", None, None)
            .await
            .unwrap();
        db::add_household_edge(&state, member.id, owner_b.id)
            .await
            .unwrap();

        revoke(&state, owner_a.id, member.id).await.unwrap();
        let owners = db::owner_ids_for_member(&state, member.id).await.unwrap();
        assert_eq!(owners, vec![owner_b.id]);
    }
}
