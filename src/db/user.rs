use super::DbExecutor;
use crate::async_message_handler_with_span;
use crate::span::AsyncSpanHandler;
use actix::prelude::*;
use actix_interop::with_ctx;
use color_eyre::eyre::Report;
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use tracing::debug;

#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, Deserialize, Serialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_string(&self) -> String {
        self.0.to_hyphenated().to_string()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// App-level identity row. Polls and votes reference it, so it must exist
/// before a user's first write, hence the upsert below.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct InternalUser {
    pub id: UserId,
    pub email: String,
}

/// Idempotent identity bootstrap, keyed by id.
#[derive(Message, Clone)]
#[rtype(result = "Result<InternalUser, Report>")]
pub struct UpsertUser {
    pub id: UserId,
    pub email: String,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<UpsertUser> for DbExecutor {
        async fn handle(msg: UpsertUser) -> Result<InternalUser, Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            debug!(user_id = msg.id.as_string().as_str(), "Upserting user row");
            let user = sqlx::query_as::<_, InternalUser>(
                r#"
                INSERT INTO users (id, email) VALUES ($1, $2)
                ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email
                RETURNING id, email
                "#,
            )
            .bind(msg.id)
            .bind(msg.email)
            .fetch_one(&pool)
            .await?;

            Ok(user)
        }
    }
}

