use actix_identity::IdentityMiddleware;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    cookie::Key,
    middleware,
    web::{self, Data},
    App, HttpResponse, HttpServer,
};
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
    SqlitePool,
};
use std::{env, str::FromStr};

mod accounts;
mod bartender;
mod db;
mod errors;
mod household;
mod routes;
mod structs;
mod utils;

use bartender::BartenderClient;
use structs::ActionResult;

#[derive(Debug, Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub bartender: BartenderClient,
}

fn get_session_key() -> Key {
    let key_str = env::var("SESSION_KEY").unwrap_or_else(|_| {
        log::error!("FATAL: SESSION_KEY environment variable not set");
        std::process::exit(1);
    });
    Key::from(key_str.as_bytes())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://barkeep.db".to_owned());

    let opts = SqliteConnectOptions::from_str(&database_url)
        .map_err(std::io::Error::other)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .read_only(false)
        .busy_timeout(std::time::Duration::from_secs(5));

    let db_pool = SqlitePool::connect_with(opts)
        .await
        .map_err(std::io::Error::other)?;

    sqlx::migrate!().run(&db_pool).await.expect("Migrate Error");

    info!("Database migrated successfully");

    let bartender = BartenderClient::from_env();

    info!("Starting HTTP server on http://localhost:8080/");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Compress::default())
            .wrap(IdentityMiddleware::default())
            .wrap(SessionMiddleware::new(
                CookieSessionStore::default(),
                get_session_key(),
            ))
            // always register the Logger middleware last
            .wrap(middleware::Logger::default())
            .service(routes::register_handler)
            .service(routes::login_handler)
            .service(routes::logout_handler)
            .service(routes::accounts_handler)
            .service(routes::list_inventory_handler)
            .service(routes::create_item_handler)
            .service(routes::update_item_handler)
            .service(routes::delete_item_handler)
            .service(routes::list_household_handler)
            .service(routes::grant_household_handler)
            .service(routes::revoke_household_handler)
            .service(routes::ask_bartender_handler)
            .app_data(Data::new(AppState {
                db_pool: db_pool.clone(),
                bartender: bartender.clone(),
            }))
            .default_service(web::to(default_handler))
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}

async fn default_handler() -> HttpResponse {
    HttpResponse::NotFound().json(ActionResult::fail("Not found"))
}
