use super::{
    option::{InternalOption, OptionId},
    user::UserId,
    DbExecutor,
};
use crate::async_message_handler_with_span;
use crate::span::AsyncSpanHandler;
use actix::prelude::*;
use actix_interop::with_ctx;
use chrono::{DateTime, Utc};
use color_eyre::eyre::{Report, WrapErr};
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use tracing::debug;

#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, Deserialize, Serialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct PollId(pub Uuid);

impl PollId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_string(&self) -> String {
        self.0.to_hyphenated().to_string()
    }
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct InternalPoll {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub expiration_date: Option<DateTime<Utc>>,
}

impl InternalPoll {
    /// A poll with an expiration strictly in the past admits no new votes.
    /// No expiration date means it never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiration_date {
            Some(expiration) => expiration < now,
            None => false,
        }
    }

    pub fn is_created_by(&self, user_id: UserId) -> bool {
        self.created_by == user_id
    }
}

/// Insert a poll together with its options in one transaction, so a poll
/// can never be observed with fewer options than it was submitted with.
#[derive(Message, Clone)]
#[rtype(result = "Result<(InternalPoll, Vec<InternalOption>), Report>")]
pub struct CreatePoll {
    pub title: String,
    pub description: String,
    pub created_by: UserId,
    pub expiration_date: Option<DateTime<Utc>>,
    pub options: Vec<String>,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<CreatePoll> for DbExecutor {
        async fn handle(msg: CreatePoll) -> Result<(InternalPoll, Vec<InternalOption>), Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            debug!(title = msg.title.as_str(), "Creating poll");
            let mut tx = pool.begin().await?;

            let poll = sqlx::query_as::<_, InternalPoll>(
                r#"
                INSERT INTO polls (id, title, description, created_by, expiration_date)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, title, description, created_by, created_at, expiration_date
                "#,
            )
            .bind(PollId::new())
            .bind(msg.title)
            .bind(msg.description)
            .bind(msg.created_by)
            .bind(msg.expiration_date)
            .fetch_one(&mut tx)
            .await
            .wrap_err("failed to create poll")?;

            let mut options = Vec::with_capacity(msg.options.len());
            for (position, option_text) in msg.options.into_iter().enumerate() {
                let option = sqlx::query_as::<_, InternalOption>(
                    r#"
                    INSERT INTO options (id, poll_id, option_text, position)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, poll_id, option_text, position
                    "#,
                )
                .bind(OptionId::new())
                .bind(poll.id)
                .bind(option_text)
                .bind(position as i64)
                .fetch_one(&mut tx)
                .await
                .wrap_err("failed to create poll options")?;
                options.push(option);
            }

            tx.commit().await?;
            Ok((poll, options))
        }
    }
}

#[derive(Message, Clone)]
#[rtype(result = "Result<Option<InternalPoll>, Report>")]
pub struct PollById(pub PollId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<PollById> for DbExecutor {
        async fn handle(msg: PollById) -> Result<Option<InternalPoll>, Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let PollById(poll_id) = msg;
            debug!(id = poll_id.as_string().as_str(), "Retrieving poll by id");
            let poll = sqlx::query_as::<_, InternalPoll>(
                r#"
                SELECT id, title, description, created_by, created_at, expiration_date
                FROM polls WHERE id = $1
                "#,
            )
            .bind(poll_id)
            .fetch_optional(&pool)
            .await?;

            Ok(poll)
        }
    }
}

/// Every poll, newest first. Dashboards partition this in memory.
#[derive(Message, Clone)]
#[rtype(result = "Result<Vec<InternalPoll>, Report>")]
pub struct AllPolls;

async_message_handler_with_span! {
    impl AsyncSpanHandler<AllPolls> for DbExecutor {
        async fn handle(_msg: AllPolls) -> Result<Vec<InternalPoll>, Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let polls = sqlx::query_as::<_, InternalPoll>(
                r#"
                SELECT id, title, description, created_by, created_at, expiration_date
                FROM polls ORDER BY created_at DESC
                "#,
            )
            .fetch_all(&pool)
            .await?;

            Ok(polls)
        }
    }
}

#[derive(Message, Clone)]
#[rtype(result = "Result<i64, Report>")]
pub struct CreatedPollCount(pub UserId);

#[derive(sqlx::FromRow)]
struct RowCount {
    count: i64,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<CreatedPollCount> for DbExecutor {
        async fn handle(msg: CreatedPollCount) -> Result<i64, Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let CreatedPollCount(user_id) = msg;
            let row = sqlx::query_as::<_, RowCount>(
                "SELECT COUNT(*) AS count FROM polls WHERE created_by = $1",
            )
            .bind(user_id)
            .fetch_one(&pool)
            .await?;

            Ok(row.count)
        }
    }
}

/// Remove a poll and everything hanging off it. Votes and options
/// reference the poll, so they go first; the transaction makes a partial
/// deletion unobservable.
#[derive(Message, Clone)]
#[rtype(result = "Result<(), Report>")]
pub struct DeletePollCascade(pub PollId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<DeletePollCascade> for DbExecutor {
        async fn handle(msg: DeletePollCascade) -> Result<(), Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let DeletePollCascade(poll_id) = msg;
            debug!(id = poll_id.as_string().as_str(), "Deleting poll");
            let mut tx = pool.begin().await?;

            sqlx::query("DELETE FROM votes WHERE poll_id = $1")
                .bind(poll_id)
                .execute(&mut tx)
                .await
                .wrap_err("failed to delete poll votes")?;

            sqlx::query("DELETE FROM options WHERE poll_id = $1")
                .bind(poll_id)
                .execute(&mut tx)
                .await
                .wrap_err("failed to delete poll options")?;

            sqlx::query("DELETE FROM polls WHERE id = $1")
                .bind(poll_id)
                .execute(&mut tx)
                .await
                .wrap_err("failed to delete poll")?;

            tx.commit().await?;
            Ok(())
        }
    }
}
