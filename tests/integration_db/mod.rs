use dotenv::dotenv;
use lazy_static::lazy_static;
use pollbox_server::db;
use sqlx::{migrate::Migrator, postgres::PgConnectOptions, PgPool};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, span};

lazy_static! {
    static ref CREATE_DB_MUTEX: Mutex<()> = Mutex::new(());
}

/// The suite needs a running Postgres; without one the db-bound tests
/// skip instead of failing.
pub fn template_database_url() -> Option<String> {
    dotenv().ok();
    std::env::var("DATABASE_URL").ok()
}

macro_rules! require_database {
    () => {
        match crate::integration_db::template_database_url() {
            Some(url) => url,
            None => {
                eprintln!("DATABASE_URL not set; skipping db-bound test");
                return;
            }
        }
    };
}

async fn create_test_db(pool: PgPool, test_db: &str) {
    let _lock = CREATE_DB_MUTEX.lock().await;
    debug!("Creating new test db");

    sqlx::query(&format!("DROP DATABASE IF EXISTS {}", test_db))
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(&format!("CREATE DATABASE {}", test_db))
        .execute(&pool)
        .await
        .unwrap();
}

async fn migrate_test_db(pool: &PgPool) {
    debug!("Applying migrations in test db");
    let migrator = Migrator::new(Path::new("migrations")).await.unwrap();
    migrator.run(pool).await.unwrap();
}

async fn drop_test_db(pool: PgPool, test_db: &str) {
    let _lock = CREATE_DB_MUTEX.lock().await;
    debug!("Dropping test db");
    sqlx::query(&format!("DROP DATABASE {}", test_db))
        .execute(&pool)
        .await
        .unwrap();
}

/// A throwaway database per test: created from the template connection,
/// migrated, and dropped again when the test finishes.
pub struct IntegrationTestDb {
    db_name: String,
    pool: PgPool,
    template_connect_options: PgConnectOptions,
}

impl IntegrationTestDb {
    pub async fn new(template_url: &str) -> Self {
        let template_connect_options: PgConnectOptions = template_url.parse().unwrap();

        // Test database with a random name so suites can run concurrently
        let db_name = format!("integration_{}", uuid::Uuid::new_v4().to_simple());
        let span = span!(tracing::Level::DEBUG, "test_db", test_db = db_name.as_str());
        let _enter = span.enter();
        let template_pool = db::new_pool_with(template_connect_options.clone())
            .await
            .unwrap();
        create_test_db(template_pool, &db_name).await;

        let integration_options = template_connect_options.clone().database(&db_name);
        let pool = db::new_pool_with(integration_options).await.unwrap();
        migrate_test_db(&pool).await;

        Self {
            db_name,
            pool,
            template_connect_options,
        }
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }
}

impl Drop for IntegrationTestDb {
    fn drop(&mut self) {
        // Cleanup test db after test is finished
        let db_name = self.db_name.clone();
        let template_connect_options = self.template_connect_options.clone();
        // Probably not the right way to run async code in drop, but it works
        tokio::task::spawn_blocking(move || {
            let span = span!(tracing::Level::DEBUG, "test_db", test_db = db_name.as_str());
            let _enter = span.enter();
            actix_rt::System::new("Cleanup").block_on(async move {
                let template_pool = db::new_pool_with(template_connect_options.clone())
                    .await
                    .unwrap();
                drop_test_db(template_pool, &db_name).await;
                debug!("Dropped test db");
            });
        });
    }
}
