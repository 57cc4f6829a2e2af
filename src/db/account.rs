use super::{user::UserId, DbExecutor};
use crate::async_message_handler_with_span;
use crate::error::{ApiError, AuthError};
use crate::span::AsyncSpanHandler;
use actix::prelude::*;
use actix_interop::with_ctx;
use color_eyre::eyre::Report;
use tracing::debug;

/// Credential row owned by the auth subsystem. Its id doubles as the user
/// id everywhere else in the schema.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct InternalAccount {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
}

#[derive(Message, Clone)]
#[rtype(result = "Result<InternalAccount, ApiError>")]
pub struct CreateAccount {
    pub email: String,
    pub password_hash: String,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<CreateAccount> for DbExecutor {
        async fn handle(msg: CreateAccount) -> Result<InternalAccount, ApiError> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            debug!(email = msg.email.as_str(), "Creating account");
            let account = sqlx::query_as::<_, InternalAccount>(
                r#"
                INSERT INTO accounts (id, email, password_hash) VALUES ($1, $2, $3)
                RETURNING id, email, password_hash
                "#,
            )
            .bind(UserId::new())
            .bind(msg.email)
            .bind(msg.password_hash)
            .fetch_one(&pool)
            .await
            .map_err(|err| {
                if super::is_unique_violation(&err) {
                    ApiError::Auth(AuthError::EmailTaken)
                } else {
                    ApiError::Store(Report::new(err))
                }
            })?;

            Ok(account)
        }
    }
}

#[derive(Message, Clone)]
#[rtype(result = "Result<Option<InternalAccount>, Report>")]
pub struct AccountByEmail(pub String);

async_message_handler_with_span! {
    impl AsyncSpanHandler<AccountByEmail> for DbExecutor {
        async fn handle(msg: AccountByEmail) -> Result<Option<InternalAccount>, Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let AccountByEmail(email) = msg;
            let account = sqlx::query_as::<_, InternalAccount>(
                "SELECT id, email, password_hash FROM accounts WHERE email = $1",
            )
            .bind(email)
            .fetch_optional(&pool)
            .await?;

            Ok(account)
        }
    }
}

#[derive(Message, Clone)]
#[rtype(result = "Result<Option<InternalAccount>, Report>")]
pub struct AccountById(pub UserId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<AccountById> for DbExecutor {
        async fn handle(msg: AccountById) -> Result<Option<InternalAccount>, Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let AccountById(id) = msg;
            let account = sqlx::query_as::<_, InternalAccount>(
                "SELECT id, email, password_hash FROM accounts WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&pool)
            .await?;

            Ok(account)
        }
    }
}
