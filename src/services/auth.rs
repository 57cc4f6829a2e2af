use super::CurrentUser;
use crate::async_message_handler_with_span;
use crate::db::{
    self,
    session::{InternalSession, SessionId},
    DbExecutor,
};
use crate::error::{ApiError, AuthError};
use crate::span::{AsyncSpanHandler, SpanMessage};
use actix::prelude::*;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use color_eyre::eyre::eyre;
use tracing::{debug, info};

/// Auth collaborator: accounts, password hashes and resumable sessions.
#[derive(Default)]
pub struct AuthActor;

impl Actor for AuthActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("Auth actor started");
    }
}

impl SystemService for AuthActor {}
impl Supervised for AuthActor {}

/// An open session plus the identity behind it, the reply to signup,
/// login and reconnect alike.
#[derive(Clone, Debug)]
pub struct AuthSession {
    pub session: InternalSession,
    pub user: CurrentUser,
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Store(eyre!("failed to hash password: {}", err)))
}

fn verify_password(password: &str, password_hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|err| ApiError::Store(eyre!("stored password hash is invalid: {}", err)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Message, Clone)]
#[rtype(result = "Result<AuthSession, ApiError>")]
pub struct SignUp {
    pub email: String,
    pub password: String,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<SignUp> for AuthActor {
        async fn handle(msg: SignUp) -> Result<AuthSession, ApiError> {
            let email = msg.email.trim().to_owned();
            if email.is_empty() || msg.password.is_empty() {
                return Err(ApiError::validation("Please fill in all fields"));
            }
            debug!(email = email.as_str(), "Signing up");

            let password_hash = hash_password(&msg.password)?;
            let account = DbExecutor::from_registry()
                .send(SpanMessage::new(db::account::CreateAccount {
                    email,
                    password_hash,
                }))
                .await??;

            let session = DbExecutor::from_registry()
                .send(SpanMessage::new(db::session::SaveSession(account.id)))
                .await?
                .map_err(ApiError::from)?;

            Ok(AuthSession {
                session,
                user: CurrentUser {
                    id: account.id,
                    email: account.email,
                },
            })
        }
    }
}

#[derive(Message, Clone)]
#[rtype(result = "Result<AuthSession, ApiError>")]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<SignIn> for AuthActor {
        async fn handle(msg: SignIn) -> Result<AuthSession, ApiError> {
            let email = msg.email.trim().to_owned();
            debug!(email = email.as_str(), "Signing in");

            let account = DbExecutor::from_registry()
                .send(SpanMessage::new(db::account::AccountByEmail(email)))
                .await?
                .map_err(ApiError::from)?
                .ok_or(ApiError::Auth(AuthError::InvalidCredentials))?;

            if !verify_password(&msg.password, &account.password_hash)? {
                return Err(ApiError::Auth(AuthError::InvalidCredentials));
            }

            let session = DbExecutor::from_registry()
                .send(SpanMessage::new(db::session::SaveSession(account.id)))
                .await?
                .map_err(ApiError::from)?;

            Ok(AuthSession {
                session,
                user: CurrentUser {
                    id: account.id,
                    email: account.email,
                },
            })
        }
    }
}

#[derive(Message, Clone)]
#[rtype(result = "Result<(), ApiError>")]
pub struct SignOut(pub SessionId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<SignOut> for AuthActor {
        async fn handle(msg: SignOut) -> Result<(), ApiError> {
            let SignOut(session_id) = msg;
            DbExecutor::from_registry()
                .send(SpanMessage::new(db::session::DeleteSession(session_id)))
                .await?
                .map_err(ApiError::from)?;
            Ok(())
        }
    }
}

/// Resume a session saved by an earlier connection (page reload).
#[derive(Message, Clone)]
#[rtype(result = "Result<AuthSession, ApiError>")]
pub struct ResumeSession(pub SessionId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<ResumeSession> for AuthActor {
        async fn handle(msg: ResumeSession) -> Result<AuthSession, ApiError> {
            let ResumeSession(session_id) = msg;
            debug!(id = session_id.as_string().as_str(), "Resuming session");

            let session = DbExecutor::from_registry()
                .send(SpanMessage::new(db::session::SessionById(session_id)))
                .await?
                .map_err(ApiError::from)?
                .ok_or(ApiError::Auth(AuthError::SessionExpired))?;

            let account = DbExecutor::from_registry()
                .send(SpanMessage::new(db::account::AccountById(session.user_id)))
                .await?
                .map_err(ApiError::from)?
                .ok_or(ApiError::Auth(AuthError::SessionExpired))?;

            Ok(AuthSession {
                session,
                user: CurrentUser {
                    id: account.id,
                    email: account.email,
                },
            })
        }
    }
}
