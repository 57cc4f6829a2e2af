use super::{poll::PollId, DbExecutor};
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
pub struct OptionId(pub Uuid);

impl OptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// One selectable answer. `position` preserves the order the creator
/// submitted, which is also the tie-break order in results.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct InternalOption {
    pub id: OptionId,
    pub poll_id: PollId,
    pub option_text: String,
    pub position: i64,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<Vec<InternalOption>, Report>")]
pub struct OptionsForPoll(pub PollId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<OptionsForPoll> for DbExecutor {
        async fn handle(msg: OptionsForPoll) -> Result<Vec<InternalOption>, Report> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let OptionsForPoll(poll_id) = msg;
            debug!(poll_id = poll_id.as_string().as_str(), "Retrieving options for poll");
            let options = sqlx::query_as::<_, InternalOption>(
                r#"
                SELECT id, poll_id, option_text, position
                FROM options WHERE poll_id = $1 ORDER BY position
                "#,
            )
            .bind(poll_id)
            .fetch_all(&pool)
            .await?;

            Ok(options)
        }
    }
}
