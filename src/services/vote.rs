use super::broadcast::{BroadcastActor, PollUpdated};
use super::CurrentUser;
use crate::async_message_handler_with_span;
use crate::db::{
    self,
    option::OptionId,
    poll::PollId,
    vote::InternalVote,
    DbExecutor,
};
use crate::domain::admission;
use crate::error::ApiError;
use crate::span::{AsyncSpanHandler, SpanMessage};
use actix::prelude::*;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

#[derive(Default)]
pub struct VoteActor;

impl Actor for VoteActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("Vote actor started");
    }
}

impl SystemService for VoteActor {}
impl Supervised for VoteActor {}

/// A vote attempt. `now` comes from the caller so admission is
/// deterministic for a given request.
#[derive(Message, Clone)]
#[rtype(result = "Result<InternalVote, ApiError>")]
pub struct CastVote {
    pub user: CurrentUser,
    pub poll_id: PollId,
    pub option_id: Option<OptionId>,
    pub now: DateTime<Utc>,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<CastVote> for VoteActor {
        async fn handle(msg: CastVote) -> Result<InternalVote, ApiError> {
            debug!(poll_id = msg.poll_id.as_string().as_str(), "Handling vote");

            let poll = DbExecutor::from_registry()
                .send(SpanMessage::new(db::poll::PollById(msg.poll_id)))
                .await?
                .map_err(ApiError::from)?
                .ok_or(ApiError::PollNotFound)?;

            let options = DbExecutor::from_registry()
                .send(SpanMessage::new(db::option::OptionsForPoll(msg.poll_id)))
                .await?
                .map_err(ApiError::from)?;

            let option_id = admission::admit(&poll, &options, msg.option_id, msg.now)?;

            // Identity bootstrap: the vote's user reference must resolve.
            DbExecutor::from_registry()
                .send(SpanMessage::new(db::user::UpsertUser {
                    id: msg.user.id,
                    email: msg.user.email.clone(),
                }))
                .await?
                .map_err(ApiError::from)?;

            // The unique index decides the one-vote-per-user race.
            let vote = DbExecutor::from_registry()
                .send(SpanMessage::new(db::vote::AddVote {
                    poll_id: poll.id,
                    option_id,
                    user_id: msg.user.id,
                }))
                .await??;

            BroadcastActor::from_registry().do_send(PollUpdated(poll.id));
            Ok(vote)
        }
    }
}
