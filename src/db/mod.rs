pub mod account;
pub mod option;
pub mod poll;
pub mod session;
pub mod user;
pub mod vote;

use actix::prelude::*;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};

/// Postgres unique-violation SQLSTATE, the signal behind the
/// one-vote-per-user and unique-email rules.
pub const UNIQUE_VIOLATION: &str = "23505";

/// System actor owning the connection pool. Every table operation is a
/// message handled on this actor; handlers grab the pool with `with_ctx`.
#[derive(Debug)]
pub struct DbExecutor(pub PgPool);

impl DbExecutor {
    pub fn pool(&mut self) -> PgPool {
        self.0.clone()
    }
}

impl Actor for DbExecutor {
    type Context = Context<Self>;
}

impl Default for DbExecutor {
    fn default() -> Self {
        unimplemented!("DbExecutor must be registered with a pool before use");
    }
}

impl SystemService for DbExecutor {}
impl Supervised for DbExecutor {}

pub async fn new_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    new_pool_with(database_url.parse()?).await
}

pub async fn new_pool_with(connect_options: PgConnectOptions) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
}

/// True iff the error is a unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
            .map(|pg| pg.code() == UNIQUE_VIOLATION)
            .unwrap_or(false),
        _ => false,
    }
}
