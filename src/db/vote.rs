use super::{option::OptionId, poll::PollId, user::UserId, DbExecutor};
use crate::async_message_handler_with_span;
use crate::error::ApiError;
use crate::span::AsyncSpanHandler;
use actix::prelude::*;
use actix_interop::with_ctx;
use color_eyre::eyre::Report;
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use tracing::debug;

#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, Deserialize, Serialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct VoteId(pub Uuid);

impl VoteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Clone, PartialEq, Eq, Debug, sqlx::FromRow)]
pub struct InternalVote {
    pub id: VoteId,
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub user_id: UserId,
}

/// Insert a vote. The `(poll_id, user_id)` unique index is the only
/// cross-client serialization point: of two racing attempts by the same
/// user exactly one row lands, the other surfaces as `DuplicateVote`.
#[derive(Message, Clone)]
#[rtype(result = "Result<InternalVote, ApiError>")]
pub struct AddVote {
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub user_id: UserId,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<AddVote> for DbExecutor {
        async fn handle(msg: AddVote) -> Result<InternalVote, ApiError> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            debug!(
                poll_id = msg.poll_id.as_string().as_str(),
                user_id = msg.user_id.as_string().as_str(),
                "Adding vote"
            );
            let vote = sqlx::query_as::<_, InternalVote>(
                r#"
                INSERT INTO votes (id, poll_id, option_id, user_id)
                VALUES ($1, $2, $3, $4)
                RETURNING id, poll_id, option_id, user_id
                "#,
            )
            .bind(VoteId::new())
            .bind(msg.poll_id)
            .bind(msg.option_id)
            .bind(msg.user_id)
            .fetch_one(&pool)
            .await
            .map_err(|err| {
                if super::is_unique_violation(&err) {
                    ApiError::DuplicateVote
                } else {
                    ApiError::Store(Report::new(err))
                }
            })?;

            Ok(vote)
        }
    }
}

#[derive(Message, Clone)]
#[rtype(result = "Result<Vec<InternalVote>, Report>")]
pub struct VotesForPoll(pub PollId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<VotesForPoll> for DbExecutor {
        async fn handle(msg: VotesForPoll) -> Result<Vec<InternalVote>, Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let VotesForPoll(poll_id) = msg;
            let votes = sqlx::query_as::<_, InternalVote>(
                "SELECT id, poll_id, option_id, user_id FROM votes WHERE poll_id = $1",
            )
            .bind(poll_id)
            .fetch_all(&pool)
            .await?;

            Ok(votes)
        }
    }
}

/// Poll ids the user has voted on; feeds the voter-dashboard exclusion.
#[derive(Message, Clone)]
#[rtype(result = "Result<Vec<PollId>, Report>")]
pub struct VotedPollIds(pub UserId);

#[derive(sqlx::FromRow)]
struct VotedPollRow {
    poll_id: PollId,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<VotedPollIds> for DbExecutor {
        async fn handle(msg: VotedPollIds) -> Result<Vec<PollId>, Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let VotedPollIds(user_id) = msg;
            let rows = sqlx::query_as::<_, VotedPollRow>(
                "SELECT poll_id FROM votes WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_all(&pool)
            .await?;

            Ok(rows.into_iter().map(|row| row.poll_id).collect())
        }
    }
}

/// Vote totals per poll for the dashboard cards. Polls without votes have
/// no row here; callers default those to zero.
#[derive(Message, Clone)]
#[rtype(result = "Result<Vec<PollVoteCount>, Report>")]
pub struct VoteCountsByPoll;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct PollVoteCount {
    pub poll_id: PollId,
    pub vote_count: i64,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<VoteCountsByPoll> for DbExecutor {
        async fn handle(_msg: VoteCountsByPoll) -> Result<Vec<PollVoteCount>, Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let counts = sqlx::query_as::<_, PollVoteCount>(
                "SELECT poll_id, COUNT(*) AS vote_count FROM votes GROUP BY poll_id",
            )
            .fetch_all(&pool)
            .await?;

            Ok(counts)
        }
    }
}

#[derive(Message, Clone)]
#[rtype(result = "Result<i64, Report>")]
pub struct VotedPollCount(pub UserId);

#[derive(sqlx::FromRow)]
struct RowCount {
    count: i64,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<VotedPollCount> for DbExecutor {
        async fn handle(msg: VotedPollCount) -> Result<i64, Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let VotedPollCount(user_id) = msg;
            let row = sqlx::query_as::<_, RowCount>(
                "SELECT COUNT(*) AS count FROM votes WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_one(&pool)
            .await?;

            Ok(row.count)
        }
    }
}
