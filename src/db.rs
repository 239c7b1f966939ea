use crate::{
    errors::AppError,
    structs::{InventoryItem, ItemInput, Patron},
    AppState,
};

/// Hard cap on every owner-scoped list query.
pub const LIST_LIMIT: i64 = 100;

pub async fn get_patron_by_id(state: &AppState, id: i64) -> Result<Option<Patron>, sqlx::Error> {
    let pool = state.db_pool.clone();
    let patron = sqlx::query_as::<_, Patron>("SELECT * FROM patrons WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    Ok(patron)
}

pub async fn get_patron_by_email(
    state: &AppState,
    email: &str,
) -> Result<Option<Patron>, sqlx::Error> {
    let pool = state.db_pool.clone();
    let patron = sqlx::query_as::<_, Patron>("SELECT * FROM patrons WHERE email = $1")
        .bind(email)
        .fetch_optional(&pool)
        .await?;
    Ok(patron)
}

pub async fn create_patron(
    state: &AppState,
    email: &str,
    pwd_hash: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
    created_by: Option<i64>,
) -> Result<Patron, AppError> {
    let created_at = chrono::Utc::now().to_string();
    let pool = state.db_pool.clone();
    let patron = sqlx::query_as::<_, Patron>(
        "INSERT INTO patrons (email, first_name, last_name, pwd_hash, created_by, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(pwd_hash)
    .bind(created_by)
    .bind(&created_at)
    .bind(&created_at)
    .fetch_one(&pool)
    .await?;
    log::info!("Patron created: id={} email={}", patron.id, patron.email);
    Ok(patron)
}

/// Owner ids the given patron is a household member of.
pub async fn owner_ids_for_member(
    state: &AppState,
    member_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    let pool = state.db_pool.clone();
    let rows = sqlx::query_scalar::<_, i64>(
        "SELECT owner_id FROM household_members WHERE member_id = $1",
    )
    .bind(member_id)
    .fetch_all(&pool)
    .await?;
    Ok(rows)
}

/// Patrons whose edge set contains the given owner, newest first.
pub async fn members_of_owner(
    state: &AppState,
    owner_id: i64,
) -> Result<Vec<Patron>, sqlx::Error> {
    let pool = state.db_pool.clone();
    let members = sqlx::query_as::<_, Patron>(
        "SELECT p.* FROM patrons p \
         JOIN household_members h ON h.member_id = p.id \
         WHERE h.owner_id = $1 ORDER BY p.created_at DESC LIMIT $2",
    )
    .bind(owner_id)
    .bind(LIST_LIMIT)
    .fetch_all(&pool)
    .await?;
    Ok(members)
}

pub async fn add_household_edge(
    state: &AppState,
    member_id: i64,
    owner_id: i64,
) -> Result<(), sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query("INSERT INTO household_members (member_id, owner_id) VALUES ($1, $2)")
        .bind(member_id)
        .bind(owner_id)
        .execute(&pool)
        .await?;
    log::info!("Household edge added: member={} owner={}", member_id, owner_id);
    Ok(())
}

pub async fn remove_household_edge(
    state: &AppState,
    member_id: i64,
    owner_id: i64,
) -> Result<(), sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query("DELETE FROM household_members WHERE member_id = $1 AND owner_id = $2")
        .bind(member_id)
        .bind(owner_id)
        .execute(&pool)
        .await?;
    log::info!("Household edge removed: member={} owner={}", member_id, owner_id);
    Ok(())
}

pub async fn list_inventory(
    state: &AppState,
    owner_id: i64,
) -> Result<Vec<InventoryItem>, sqlx::Error> {
    let pool = state.db_pool.clone();
    let items = sqlx::query_as::<_, InventoryItem>(
        "SELECT * FROM inventory_items WHERE owner_id = $1 \
         ORDER BY created_at DESC LIMIT $2",
    )
    .bind(owner_id)
    .bind(LIST_LIMIT)
    .fetch_all(&pool)
    .await?;
    Ok(items)
}

pub async fn get_item(state: &AppState, id: i64) -> Result<Option<InventoryItem>, sqlx::Error> {
    let pool = state.db_pool.clone();
    let item = sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory_items WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    Ok(item)
}

pub async fn create_item(
    state: &AppState,
    owner_id: i64,
    input: &ItemInput,
) -> Result<InventoryItem, sqlx::Error> {
    let created_at = chrono::Utc::now().to_string();
    let pool = state.db_pool.clone();
    let item = sqlx::query_as::<_, InventoryItem>(
        "INSERT INTO inventory_items \
         (name, quantity, category, brand, notes, purchase_date, owner_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(&input.name)
    .bind(input.quantity)
    .bind(input.category)
    .bind(&input.brand)
    .bind(&input.notes)
    .bind(&input.purchase_date)
    .bind(owner_id)
    .bind(&created_at)
    .bind(&created_at)
    .fetch_one(&pool)
    .await?;
    log::info!("Inventory item created: id={} owner={}", item.id, owner_id);
    Ok(item)
}

/// Overwrites all mutable fields. Last write wins; there is no version check.
pub async fn update_item(
    state: &AppState,
    id: i64,
    input: &ItemInput,
) -> Result<InventoryItem, sqlx::Error> {
    let updated_at = chrono::Utc::now().to_string();
    let pool = state.db_pool.clone();
    let item = sqlx::query_as::<_, InventoryItem>(
        "UPDATE inventory_items SET name = $1, quantity = $2, category = $3, \
         brand = $4, notes = $5, purchase_date = $6, updated_at = $7 \
         WHERE id = $8 RETURNING *",
    )
    .bind(&input.name)
    .bind(input.quantity)
    .bind(input.category)
    .bind(&input.brand)
    .bind(&input.notes)
    .bind(&input.purchase_date)
    .bind(&updated_at)
    .bind(id)
    .fetch_one(&pool)
    .await?;
    log::info!("Inventory item updated: id={}", id);
    Ok(item)
}

pub async fn delete_item(state: &AppState, id: i64) -> Result<(), sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query("DELETE FROM inventory_items WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;
    log::info!("Inventory item deleted: id={}", id);
    Ok(())
}
