use actix::MailboxError;
use color_eyre::eyre::{eyre, Report};
use thiserror::Error;

/// Failure of a sign-in/sign-up/reconnect attempt. Each known sub-case
/// carries its own human-readable message; everything else ends up as a
/// generic `ApiError::Store`.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("The email or password you entered is incorrect. Please try again.")]
    InvalidCredentials,
    #[error("An account with this email already exists.")]
    EmailTaken,
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,
}

/// Everything a service handler can answer with. The websocket edge turns
/// one of these into a single outgoing `error {code, message}` payload and
/// leaves the connection state untouched.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("You have already voted in this poll")]
    DuplicateVote,
    #[error("This poll has expired")]
    PollExpired,
    #[error("Poll not found")]
    PollNotFound,
    #[error("Only the poll creator can do that")]
    NotCreator,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("You need to sign in first")]
    Unauthenticated,
    /// Store or mailbox failure. Logged with its full chain at the edge;
    /// clients only ever see a generic notice.
    #[error(transparent)]
    Store(#[from] Report),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    /// Stable wire code for the client to branch on.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::DuplicateVote => "duplicate_vote",
            ApiError::PollExpired => "poll_expired",
            ApiError::PollNotFound => "not_found",
            ApiError::NotCreator => "forbidden",
            ApiError::Auth(_) => "auth",
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::Store(_) => "store",
        }
    }

    /// Message shown to the user. Store internals are not leaked.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Store(_) => "Something went wrong. Please try again.".to_owned(),
            other => other.to_string(),
        }
    }
}

impl From<MailboxError> for ApiError {
    fn from(err: MailboxError) -> Self {
        ApiError::Store(eyre!("actor mailbox error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::eyre;

    #[test]
    fn store_errors_are_not_leaked() {
        let err = ApiError::Store(eyre!("connection refused (db details)"));
        assert_eq!(err.code(), "store");
        assert!(!err.user_message().contains("db details"));
    }

    #[test]
    fn known_errors_keep_their_message() {
        assert_eq!(
            ApiError::DuplicateVote.user_message(),
            "You have already voted in this poll"
        );
        assert_eq!(
            ApiError::Auth(AuthError::InvalidCredentials).code(),
            "auth"
        );
    }
}
