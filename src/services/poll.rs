use super::broadcast::{BroadcastActor, PollRemoved};
use super::CurrentUser;
use crate::async_message_handler_with_span;
use crate::db::{
    self,
    option::{InternalOption, OptionId},
    poll::{InternalPoll, PollId},
    vote::InternalVote,
    DbExecutor,
};
use crate::domain::dashboard::{self, DashboardView, PollOverview};
use crate::domain::draft::PollDraft;
use crate::domain::tally::{self, OptionTally};
use crate::error::ApiError;
use crate::span::{AsyncSpanHandler, SpanMessage};
use actix::prelude::*;
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Default)]
pub struct PollActor;

impl Actor for PollActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("Poll actor started");
    }
}

impl SystemService for PollActor {}
impl Supervised for PollActor {}

/// What a given viewer gets for a poll: creators and voters see the
/// aggregated results, everyone else gets the selectable ballot.
#[derive(Clone, Debug)]
pub enum PollView {
    Ballot { options: Vec<InternalOption> },
    Results {
        tallies: Vec<OptionTally>,
        total_votes: i64,
    },
}

#[derive(Clone, Debug)]
pub struct PollDetail {
    pub poll: InternalPoll,
    pub viewer_is_creator: bool,
    pub expired: bool,
    pub user_vote: Option<OptionId>,
    pub view: PollView,
}

fn assemble_detail(
    poll: InternalPoll,
    options: Vec<InternalOption>,
    votes: &[InternalVote],
    viewer: &CurrentUser,
) -> PollDetail {
    let viewer_is_creator = poll.is_created_by(viewer.id);
    let expired = poll.is_expired(Utc::now());
    let user_vote = votes
        .iter()
        .find(|vote| vote.user_id == viewer.id)
        .map(|vote| vote.option_id);

    let view = if viewer_is_creator || user_vote.is_some() {
        let tallies = tally::tally(&options, votes);
        let total_votes = tally::total_votes(&tallies);
        PollView::Results {
            tallies,
            total_votes,
        }
    } else {
        PollView::Ballot { options }
    };

    PollDetail {
        poll,
        viewer_is_creator,
        expired,
        user_vote,
        view,
    }
}

async fn fetch_detail(poll_id: PollId, viewer: &CurrentUser) -> Result<PollDetail, ApiError> {
    let poll = DbExecutor::from_registry()
        .send(SpanMessage::new(db::poll::PollById(poll_id)))
        .await?
        .map_err(ApiError::from)?
        .ok_or(ApiError::PollNotFound)?;

    let options = DbExecutor::from_registry()
        .send(SpanMessage::new(db::option::OptionsForPoll(poll_id)))
        .await?
        .map_err(ApiError::from)?;

    let votes = DbExecutor::from_registry()
        .send(SpanMessage::new(db::vote::VotesForPoll(poll_id)))
        .await?
        .map_err(ApiError::from)?;

    Ok(assemble_detail(poll, options, &votes, viewer))
}

/// Validate a draft and persist the poll with its options. The viewer is
/// upserted into `users` first so the creator reference resolves.
#[derive(Message, Clone)]
#[rtype(result = "Result<PollDetail, ApiError>")]
pub struct CreateNewPoll {
    pub user: CurrentUser,
    pub draft: PollDraft,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<CreateNewPoll> for PollActor {
        async fn handle(msg: CreateNewPoll) -> Result<PollDetail, ApiError> {
            let valid = msg.draft.validate(Utc::now())?;
            debug!(title = valid.title.as_str(), "Creating new poll");

            DbExecutor::from_registry()
                .send(SpanMessage::new(db::user::UpsertUser {
                    id: msg.user.id,
                    email: msg.user.email.clone(),
                }))
                .await?
                .map_err(ApiError::from)?;

            let (poll, options) = DbExecutor::from_registry()
                .send(SpanMessage::new(db::poll::CreatePoll {
                    title: valid.title,
                    description: valid.description,
                    created_by: msg.user.id,
                    expiration_date: valid.expiration_date,
                    options: valid.options,
                }))
                .await?
                .map_err(ApiError::from)?;

            Ok(assemble_detail(poll, options, &[], &msg.user))
        }
    }
}

#[derive(Message, Clone)]
#[rtype(result = "Result<PollDetail, ApiError>")]
pub struct FetchPollDetail {
    pub poll_id: PollId,
    pub user: CurrentUser,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<FetchPollDetail> for PollActor {
        async fn handle(msg: FetchPollDetail) -> Result<PollDetail, ApiError> {
            fetch_detail(msg.poll_id, &msg.user).await
        }
    }
}

/// Results view: tallies ranked by count, leading option flagged.
#[derive(Clone, Debug)]
pub struct PollResults {
    pub poll: InternalPoll,
    pub viewer_is_creator: bool,
    pub viewer_has_voted: bool,
    pub ranked: Vec<OptionTally>,
    pub total_votes: i64,
    pub leading: Option<OptionId>,
}

#[derive(Message, Clone)]
#[rtype(result = "Result<PollResults, ApiError>")]
pub struct FetchResults {
    pub poll_id: PollId,
    pub user: CurrentUser,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<FetchResults> for PollActor {
        async fn handle(msg: FetchResults) -> Result<PollResults, ApiError> {
            let poll = DbExecutor::from_registry()
                .send(SpanMessage::new(db::poll::PollById(msg.poll_id)))
                .await?
                .map_err(ApiError::from)?
                .ok_or(ApiError::PollNotFound)?;

            let options = DbExecutor::from_registry()
                .send(SpanMessage::new(db::option::OptionsForPoll(msg.poll_id)))
                .await?
                .map_err(ApiError::from)?;

            let votes = DbExecutor::from_registry()
                .send(SpanMessage::new(db::vote::VotesForPoll(msg.poll_id)))
                .await?
                .map_err(ApiError::from)?;

            let viewer_is_creator = poll.is_created_by(msg.user.id);
            let viewer_has_voted = votes.iter().any(|vote| vote.user_id == msg.user.id);
            let ranked = tally::ranked(&tally::tally(&options, &votes));
            let total_votes = tally::total_votes(&ranked);
            let leading = tally::leading(&ranked).map(|t| t.option.id);

            Ok(PollResults {
                poll,
                viewer_is_creator,
                viewer_has_voted,
                ranked,
                total_votes,
                leading,
            })
        }
    }
}

#[derive(Clone, Debug)]
pub struct Dashboard {
    pub landing: DashboardView,
    pub created: Vec<PollOverview>,
    pub open: Vec<PollOverview>,
}

#[derive(Message, Clone)]
#[rtype(result = "Result<Dashboard, ApiError>")]
pub struct FetchDashboard {
    pub user: CurrentUser,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<FetchDashboard> for PollActor {
        async fn handle(msg: FetchDashboard) -> Result<Dashboard, ApiError> {
            let polls = DbExecutor::from_registry()
                .send(SpanMessage::new(db::poll::AllPolls))
                .await?
                .map_err(ApiError::from)?;

            let counts = DbExecutor::from_registry()
                .send(SpanMessage::new(db::vote::VoteCountsByPoll))
                .await?
                .map_err(ApiError::from)?;

            let voted: HashSet<PollId> = DbExecutor::from_registry()
                .send(SpanMessage::new(db::vote::VotedPollIds(msg.user.id)))
                .await?
                .map_err(ApiError::from)?
                .into_iter()
                .collect();

            let overviews = dashboard::with_vote_counts(polls, &counts);
            let split = dashboard::partition(overviews, msg.user.id, &voted);
            let landing = dashboard::landing(&split);

            Ok(Dashboard {
                landing,
                created: split.created,
                open: split.open,
            })
        }
    }
}

/// Creator-only cascade delete; notifies connected clients afterwards.
#[derive(Message, Clone)]
#[rtype(result = "Result<PollId, ApiError>")]
pub struct RemovePoll {
    pub poll_id: PollId,
    pub user: CurrentUser,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<RemovePoll> for PollActor {
        async fn handle(msg: RemovePoll) -> Result<PollId, ApiError> {
            let poll = DbExecutor::from_registry()
                .send(SpanMessage::new(db::poll::PollById(msg.poll_id)))
                .await?
                .map_err(ApiError::from)?
                .ok_or(ApiError::PollNotFound)?;

            if !poll.is_created_by(msg.user.id) {
                return Err(ApiError::NotCreator);
            }

            DbExecutor::from_registry()
                .send(SpanMessage::new(db::poll::DeletePollCascade(poll.id)))
                .await?
                .map_err(ApiError::from)?;

            BroadcastActor::from_registry().do_send(PollRemoved(poll.id));
            Ok(poll.id)
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProfileStats {
    pub email: String,
    pub polls_created: i64,
    pub polls_voted: i64,
}

#[derive(Message, Clone)]
#[rtype(result = "Result<ProfileStats, ApiError>")]
pub struct FetchProfile {
    pub user: CurrentUser,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<FetchProfile> for PollActor {
        async fn handle(msg: FetchProfile) -> Result<ProfileStats, ApiError> {
            let polls_created = DbExecutor::from_registry()
                .send(SpanMessage::new(db::poll::CreatedPollCount(msg.user.id)))
                .await?
                .map_err(ApiError::from)?;

            let polls_voted = DbExecutor::from_registry()
                .send(SpanMessage::new(db::vote::VotedPollCount(msg.user.id)))
                .await?
                .map_err(ApiError::from)?;

            Ok(ProfileStats {
                email: msg.user.email,
                polls_created,
                polls_voted,
            })
        }
    }
}
