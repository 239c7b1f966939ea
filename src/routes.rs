use actix_identity::Identity;
use actix_web::{
    delete, get, post, put,
    web::{self, Data},
    HttpMessage, HttpRequest, HttpResponse, Responder,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    accounts::{self, AccountInfo},
    bartender, db,
    errors::AppError,
    household,
    structs::{ActionResult, Category, ItemInput},
    utils, AppState,
};

/// Resolves the calling session to a fresh accessible-account set. The set is
/// recomputed on every request; household membership can change between
/// requests, so it is never cached in the cookie.
async fn current_session(
    state: &AppState,
    identity: Option<Identity>,
) -> Result<AccountInfo, AppError> {
    let identity = identity.ok_or(AppError::Unauthorized)?;
    let id = identity
        .id()
        .map_err(|e| AppError::Session(e.to_string()))?;
    let user_id: i64 = id.parse().map_err(|_| AppError::Unauthorized)?;
    accounts::resolve_account_info(state, user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Guards a target account against the session's accessible set.
fn require_access(session: &AccountInfo, target_account_id: i64) -> Result<(), AppError> {
    let accessible = session.accessible_ids();
    if accounts::authorize(session.user_id, target_account_id, Some(&accessible)) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

#[derive(Deserialize)]
pub struct RegisterForm {
    email: String,
    password: String,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[post("/register")]
pub async fn register_handler(
    web::Form(form): web::Form<RegisterForm>,
    state: Data<AppState>,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    if form.email.is_empty() || form.password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_owned(),
        ));
    }
    if !form.email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_owned()));
    }
    if form.password.len() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".to_owned(),
        ));
    }

    let lc_email = form.email.to_lowercase();
    if db::get_patron_by_email(&state, &lc_email).await?.is_some() {
        return Err(AppError::DuplicateAccount);
    }

    let pwd_hash = utils::hash_password(&form.password)?;
    let patron = db::create_patron(
        &state,
        &lc_email,
        &pwd_hash,
        form.first_name.as_deref().filter(|s| !s.is_empty()),
        form.last_name.as_deref().filter(|s| !s.is_empty()),
        None,
    )
    .await?;

    Identity::login(&request.extensions(), patron.id.to_string())
        .map_err(|e| AppError::Session(e.to_string()))?;

    Ok(HttpResponse::Ok().json(ActionResult::ok()))
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[post("/login")]
pub async fn login_handler(
    web::Form(form): web::Form<LoginForm>,
    state: Data<AppState>,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    if form.email.is_empty() || form.password.is_empty() {
        return Err(AppError::Validation("All fields are required".to_owned()));
    }

    let lc_email = form.email.to_lowercase();
    let Some(patron) = db::get_patron_by_email(&state, &lc_email).await? else {
        return Ok(HttpResponse::Unauthorized().json(ActionResult::fail("Invalid credentials")));
    };

    if !utils::verify_password(&form.password, &patron.pwd_hash)? {
        log::warn!("Failed login attempt for patron id={}", patron.id);
        return Ok(HttpResponse::Unauthorized().json(ActionResult::fail("Invalid credentials")));
    }

    Identity::login(&request.extensions(), patron.id.to_string())
        .map_err(|e| AppError::Session(e.to_string()))?;

    Ok(HttpResponse::Ok().json(ActionResult::ok()))
}

#[post("/logout")]
pub async fn logout_handler(identity: Identity) -> impl Responder {
    identity.logout();
    HttpResponse::Ok().json(ActionResult::ok())
}

/// Accounts the caller may act on, for the account selector.
#[get("/api/accounts")]
pub async fn accounts_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let session = current_session(&state, identity).await?;
    Ok(HttpResponse::Ok().json(session))
}

#[derive(Deserialize)]
pub struct InventoryQuery {
    account: Option<i64>,
}

#[get("/api/inventory")]
pub async fn list_inventory_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
    query: web::Query<InventoryQuery>,
) -> Result<impl Responder, AppError> {
    let session = current_session(&state, identity).await?;
    let target = query.account.unwrap_or(session.user_id);
    require_access(&session, target)?;

    let items = db::list_inventory(&state, target).await?;
    Ok(HttpResponse::Ok().json(items))
}

#[derive(Deserialize)]
pub struct ItemPayload {
    name: Option<String>,
    quantity: Option<Value>,
    category: Option<String>,
    brand: Option<String>,
    notes: Option<String>,
    purchase_date: Option<String>,
    account: Option<i64>,
}

/// Quantity rules: absent or non-numeric defaults to 1, negatives are
/// rejected, fractions are truncated.
fn parse_quantity(raw: Option<&Value>) -> Result<i64, AppError> {
    let Some(value) = raw else { return Ok(1) };
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|q| q.is_finite()),
        _ => None,
    };
    match parsed {
        Some(q) if q < 0.0 => Err(AppError::Validation(
            "Quantity must be a non-negative number".to_owned(),
        )),
        Some(q) => Ok(q as i64),
        None => Ok(1),
    }
}

fn validate_item(payload: &ItemPayload) -> Result<ItemInput, AppError> {
    let name = payload
        .name
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Name and category are required".to_owned()))?;
    let category = payload
        .category
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Name and category are required".to_owned()))?
        .parse::<Category>()
        .map_err(|_| {
            AppError::Validation("Category must be one of liquor, mixer, wine".to_owned())
        })?;

    Ok(ItemInput {
        name: name.to_owned(),
        quantity: parse_quantity(payload.quantity.as_ref())?,
        category,
        brand: payload.brand.clone().filter(|s| !s.is_empty()),
        notes: payload.notes.clone().filter(|s| !s.is_empty()),
        purchase_date: payload.purchase_date.clone().filter(|s| !s.is_empty()),
    })
}

#[post("/api/inventory")]
pub async fn create_item_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
    payload: web::Json<ItemPayload>,
) -> Result<impl Responder, AppError> {
    let session = current_session(&state, identity).await?;
    let target = payload.account.unwrap_or(session.user_id);
    require_access(&session, target)?;

    let input = validate_item(&payload)?;
    db::create_item(&state, target, &input).await?;
    Ok(HttpResponse::Ok().json(ActionResult::ok()))
}

#[put("/api/inventory/{id}")]
pub async fn update_item_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
    path: web::Path<i64>,
    payload: web::Json<ItemPayload>,
) -> Result<impl Responder, AppError> {
    let session = current_session(&state, identity).await?;
    let item = db::get_item(&state, path.into_inner())
        .await?
        .ok_or(AppError::NotFound)?;
    // authorization is against the stored owner, not any account id the
    // request claims
    require_access(&session, item.owner_id)?;

    let input = validate_item(&payload)?;
    db::update_item(&state, item.id, &input).await?;
    Ok(HttpResponse::Ok().json(ActionResult::ok()))
}

#[delete("/api/inventory/{id}")]
pub async fn delete_item_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let session = current_session(&state, identity).await?;
    let item = db::get_item(&state, path.into_inner())
        .await?
        .ok_or(AppError::NotFound)?;
    require_access(&session, item.owner_id)?;

    db::delete_item(&state, item.id).await?;
    Ok(HttpResponse::Ok().json(ActionResult::ok()))
}

#[get("/api/household")]
pub async fn list_household_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let session = current_session(&state, identity).await?;
    let members = household::list_members(&state, session.user_id).await?;
    Ok(HttpResponse::Ok().json(members))
}

#[derive(Deserialize)]
pub struct GrantPayload {
    email: String,
    password: String,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[post("/api/household")]
pub async fn grant_household_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
    payload: web::Json<GrantPayload>,
) -> Result<impl Responder, AppError> {
    let session = current_session(&state, identity).await?;
    household::grant(
        &state,
        session.user_id,
        &payload.email,
        &payload.password,
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(ActionResult::ok()))
}

#[delete("/api/household/{member_id}")]
pub async fn revoke_household_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let session = current_session(&state, identity).await?;
    household::revoke(&state, session.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ActionResult::ok()))
}

#[derive(Deserialize)]
pub struct AskPayload {
    question: String,
    account: Option<i64>,
    response_id: Option<String>,
}

#[post("/api/ask-bartender")]
pub async fn ask_bartender_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
    payload: web::Json<AskPayload>,
) -> Result<impl Responder, AppError> {
    let session = current_session(&state, identity).await?;
    if payload.question.is_empty() {
        return Err(AppError::Validation("Missing question".to_owned()));
    }

    let target = payload.account.unwrap_or(session.user_id);
    require_access(&session, target)?;

    let answer = bartender::ask_bartender(
        &state,
        target,
        &payload.question,
        payload.response_id.as_deref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{accounts::AccountAccess, test_support};
    use actix_identity::IdentityMiddleware;
    use actix_session::{storage::CookieSessionStore, SessionMiddleware};
    use actix_web::{cookie::Key, http::StatusCode, test as actix_test, App};
    use serde_json::json;

    fn session(user_id: i64, household_ids: &[i64]) -> AccountInfo {
        let access = |id: i64| AccountAccess {
            id,
            name: format!("patron-{id}"),
            email: format!("{id}@example.com"),
        };
        let household_accounts: Vec<_> = household_ids.iter().map(|&id| access(id)).collect();
        let mut accessible_accounts = vec![access(user_id)];
        accessible_accounts.extend(household_accounts.iter().cloned());
        AccountInfo {
            user_id,
            own_account: access(user_id),
            household_accounts,
            accessible_accounts,
        }
    }

    #[test]
    fn guard_allows_self_and_granted_accounts() {
        let s = session(1, &[7]);
        assert!(require_access(&s, 1).is_ok());
        assert!(require_access(&s, 7).is_ok());
    }

    #[test]
    fn guard_denies_accounts_outside_the_accessible_set() {
        // owning account 1 does not imply access to account 9
        let s = session(1, &[7]);
        assert!(matches!(
            require_access(&s, 9),
            Err(AppError::Unauthorized)
        ));
    }

    #[actix_web::test]
    async fn update_and_delete_are_guarded_by_the_stored_owner() {
        let state = test_support::state().await;
        let owner = test_support::patron(&state, "x@example.com").await;
        let item = db::create_item(
            &state,
            owner.id,
            &ItemInput {
                name: "Gin".to_owned(),
                quantity: 2,
                category: Category::Liquor,
                brand: None,
                notes: None,
                purchase_date: None,
            },
        )
        .await
        .unwrap();

        let app = actix_test::init_service(
            App::new()
                .wrap(IdentityMiddleware::default())
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
                        .cookie_secure(false)
                        .build(),
                )
                .app_data(Data::new(state.clone()))
                .service(register_handler)
                .service(update_item_handler)
                .service(delete_item_handler),
        )
        .await;

        // an unrelated caller with a session of their own
        let resp = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/register")
                .set_form([("email", "y@example.com"), ("password", "secret1")])
                .to_request(),
        )
        .await;
        assert!(resp.status().is_success());
        let cookies: Vec<_> = resp.response().cookies().map(|c| c.into_owned()).collect();
        let caller = db::get_patron_by_email(&state, "y@example.com")
            .await
            .unwrap()
            .unwrap();

        // claiming the caller's own account in the payload must not help;
        // authorization runs against the item's stored owner
        let mut put = actix_test::TestRequest::put()
            .uri(&format!("/api/inventory/{}", item.id))
            .set_json(json!({
                "name": "Rum",
                "category": "liquor",
                "account": caller.id,
            }));
        for cookie in &cookies {
            put = put.cookie(cookie.clone());
        }
        let resp = actix_test::call_service(&app, put.to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let mut del = actix_test::TestRequest::delete().uri(&format!("/api/inventory/{}", item.id));
        for cookie in &cookies {
            del = del.cookie(cookie.clone());
        }
        let resp = actix_test::call_service(&app, del.to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        // the item survives untouched
        let survivor = db::get_item(&state, item.id).await.unwrap().unwrap();
        assert_eq!(survivor.name, "Gin");
        assert_eq!(survivor.owner_id, owner.id);
    }

    fn payload(name: Option<&str>, quantity: Option<Value>, category: Option<&str>) -> ItemPayload {
        ItemPayload {
            name: name.map(Into::into),
            quantity,
            category: category.map(Into::into),
            brand: None,
            notes: None,
            purchase_date: None,
            account: None,
        }
    }

    #[test]
    fn item_requires_name_and_category() {
        assert!(matches!(
            validate_item(&payload(None, None, Some("liquor"))),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_item(&payload(Some("Gin"), None, None)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn item_rejects_unknown_category() {
        assert!(matches!(
            validate_item(&payload(Some("Beer"), None, Some("beer"))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn quantity_defaults_to_one_when_absent_or_non_numeric() {
        let input = validate_item(&payload(Some("Gin"), None, Some("liquor"))).unwrap();
        assert_eq!(input.quantity, 1);
        let input =
            validate_item(&payload(Some("Gin"), Some(json!("plenty")), Some("liquor"))).unwrap();
        assert_eq!(input.quantity, 1);
    }

    #[test]
    fn quantity_accepts_numbers_and_numeric_strings() {
        let input = validate_item(&payload(Some("Gin"), Some(json!(4)), Some("liquor"))).unwrap();
        assert_eq!(input.quantity, 4);
        let input = validate_item(&payload(Some("Gin"), Some(json!("2")), Some("liquor"))).unwrap();
        assert_eq!(input.quantity, 2);
    }

    #[test]
    fn quantity_rejects_negatives() {
        assert!(matches!(
            validate_item(&payload(Some("Gin"), Some(json!(-1)), Some("liquor"))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let mut p = payload(Some("Gin"), None, Some("liquor"));
        p.brand = Some(String::new());
        p.notes = Some(String::new());
        let input = validate_item(&p).unwrap();
        assert!(input.brand.is_none());
        assert!(input.notes.is_none());
    }
}
