use crate::db::option::{InternalOption, OptionId};
use crate::db::poll::PollId;
use crate::db::session::SessionId;
use crate::db::user::UserId;
use crate::domain::dashboard::{DashboardView, PollOverview};
use crate::domain::draft::{DraftOptions, PollDraft};
use crate::domain::tally::OptionTally;
use crate::error::ApiError;
use crate::services::auth::AuthSession;
use crate::services::poll::{Dashboard, PollDetail, PollResults, PollView};
use crate::services::{self, auth, poll, vote, CurrentUser};
use crate::span::SpanMessage;
use actix::prelude::*;
use actix_web_actors::ws;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

// Incoming messages

#[derive(Debug, Serialize, Deserialize)]
pub struct IncomingSignup {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncomingLogin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncomingReconnect {
    pub session_id: SessionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncomingCreatePoll {
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub expiration_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncomingVote {
    pub poll_id: PollId,
    pub option_id: Option<OptionId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncomingPollRequest {
    pub poll_id: PollId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    #[serde(rename = "signup")]
    Signup(IncomingSignup),
    #[serde(rename = "login")]
    Login(IncomingLogin),
    #[serde(rename = "logout")]
    Logout,
    #[serde(rename = "reconnect")]
    Reconnect(IncomingReconnect),
    #[serde(rename = "create_poll")]
    CreatePoll(IncomingCreatePoll),
    #[serde(rename = "vote")]
    Vote(IncomingVote),
    #[serde(rename = "dashboard")]
    Dashboard,
    #[serde(rename = "poll")]
    Poll(IncomingPollRequest),
    #[serde(rename = "results")]
    Results(IncomingPollRequest),
    #[serde(rename = "delete_poll")]
    DeletePoll(IncomingPollRequest),
    #[serde(rename = "profile")]
    Profile,
}

// Outgoing messages

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingUser {
    pub id: UserId,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingSession {
    pub session_id: SessionId,
    pub user: OutgoingUser,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingPollSummary {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub vote_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingDashboard {
    pub view: String,
    pub created: Vec<OutgoingPollSummary>,
    pub open: Vec<OutgoingPollSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingOption {
    pub id: OptionId,
    pub option_text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingTally {
    pub id: OptionId,
    pub option_text: String,
    pub vote_count: i64,
    pub percentage: f64,
    #[serde(default)]
    pub leading: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingResultsBody {
    pub options: Vec<OutgoingTally>,
    pub total_votes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingPollDetail {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub expired: bool,
    pub is_creator: bool,
    pub user_vote: Option<OptionId>,
    /// Present when the viewer may still vote.
    pub ballot: Option<Vec<OutgoingOption>>,
    /// Present when the viewer sees aggregated results instead.
    pub results: Option<OutgoingResultsBody>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingResults {
    pub poll_id: PollId,
    pub title: String,
    pub description: String,
    pub is_creator: bool,
    pub has_voted: bool,
    pub options: Vec<OutgoingTally>,
    pub total_votes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingVoteAccepted {
    pub poll_id: PollId,
    pub option_id: OptionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingPollRef {
    pub poll_id: PollId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingProfile {
    pub email: String,
    pub polls_created: i64,
    pub polls_voted: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    #[serde(rename = "session")]
    Session(OutgoingSession),
    #[serde(rename = "logged_out")]
    LoggedOut,
    #[serde(rename = "dashboard")]
    Dashboard(OutgoingDashboard),
    #[serde(rename = "poll")]
    Poll(OutgoingPollDetail),
    #[serde(rename = "poll_created")]
    PollCreated(OutgoingPollDetail),
    #[serde(rename = "results")]
    Results(OutgoingResults),
    #[serde(rename = "vote_accepted")]
    VoteAccepted(OutgoingVoteAccepted),
    #[serde(rename = "poll_updated")]
    PollUpdated(OutgoingPollRef),
    #[serde(rename = "poll_removed")]
    PollRemoved(OutgoingPollRef),
    #[serde(rename = "poll_deleted")]
    PollDeleted(OutgoingPollRef),
    #[serde(rename = "profile")]
    Profile(OutgoingProfile),
    #[serde(rename = "error")]
    Error(OutgoingError),
}

// Payload assembly

fn summary_payload(overview: &PollOverview) -> OutgoingPollSummary {
    OutgoingPollSummary {
        id: overview.poll.id,
        title: overview.poll.title.clone(),
        description: overview.poll.description.clone(),
        created_at: overview.poll.created_at,
        expiration_date: overview.poll.expiration_date,
        vote_count: overview.vote_count,
    }
}

fn dashboard_payload(dashboard: Dashboard) -> OutgoingDashboard {
    let view = match dashboard.landing {
        DashboardView::Creator => "creator",
        DashboardView::Voter => "voter",
    };
    OutgoingDashboard {
        view: view.to_owned(),
        created: dashboard.created.iter().map(summary_payload).collect(),
        open: dashboard.open.iter().map(summary_payload).collect(),
    }
}

fn option_payload(option: &InternalOption) -> OutgoingOption {
    OutgoingOption {
        id: option.id,
        option_text: option.option_text.clone(),
    }
}

fn tally_payload(tally: &OptionTally, leading: Option<OptionId>) -> OutgoingTally {
    OutgoingTally {
        id: tally.option.id,
        option_text: tally.option.option_text.clone(),
        vote_count: tally.vote_count,
        percentage: tally.percentage,
        leading: leading == Some(tally.option.id),
    }
}

fn detail_payload(detail: PollDetail) -> OutgoingPollDetail {
    let (ballot, results) = match detail.view {
        PollView::Ballot { options } => {
            (Some(options.iter().map(option_payload).collect()), None)
        }
        PollView::Results {
            tallies,
            total_votes,
        } => (
            None,
            Some(OutgoingResultsBody {
                options: tallies.iter().map(|t| tally_payload(t, None)).collect(),
                total_votes,
            }),
        ),
    };

    OutgoingPollDetail {
        id: detail.poll.id,
        title: detail.poll.title,
        description: detail.poll.description,
        created_by: detail.poll.created_by,
        created_at: detail.poll.created_at,
        expiration_date: detail.poll.expiration_date,
        expired: detail.expired,
        is_creator: detail.viewer_is_creator,
        user_vote: detail.user_vote,
        ballot,
        results,
    }
}

fn results_payload(results: PollResults) -> OutgoingResults {
    OutgoingResults {
        poll_id: results.poll.id,
        title: results.poll.title.clone(),
        description: results.poll.description.clone(),
        is_creator: results.viewer_is_creator,
        has_voted: results.viewer_has_voted,
        options: results
            .ranked
            .iter()
            .map(|t| tally_payload(t, results.leading))
            .collect(),
        total_votes: results.total_votes,
    }
}

fn session_payload(auth: &AuthSession) -> OutgoingSession {
    OutgoingSession {
        session_id: auth.session.id,
        user: OutgoingUser {
            id: auth.user.id,
            email: auth.user.email.clone(),
        },
    }
}

fn flatten<T>(res: Result<Result<T, ApiError>, actix::MailboxError>) -> Result<T, ApiError> {
    res.map_err(ApiError::from).and_then(|inner| inner)
}

// Connection actor

pub struct WsClient {
    user: Option<CurrentUser>,
    session: Option<SessionId>,
}

impl WsClient {
    pub fn new() -> WsClient {
        WsClient {
            user: None,
            session: None,
        }
    }

    fn send_json<T: Serialize>(&self, ctx: &mut ws::WebsocketContext<Self>, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => ctx.text(json),
            Err(err) => error!(
                "Failed to convert to JSON {error}",
                error = err.to_string()
            ),
        }
    }

    fn send_error(&self, ctx: &mut ws::WebsocketContext<Self>, err: ApiError) {
        if let ApiError::Store(report) = &err {
            error!(error = format!("{:?}", report).as_str(), "Store operation failed");
        }
        self.send_json(
            ctx,
            &OutgoingMessage::Error(OutgoingError {
                code: err.code().to_owned(),
                message: err.user_message(),
            }),
        );
    }

    fn current_user(&self) -> Result<CurrentUser, ApiError> {
        self.user.clone().ok_or(ApiError::Unauthenticated)
    }

    fn establish_session(&mut self, ctx: &mut ws::WebsocketContext<Self>, auth: AuthSession) {
        self.user = Some(auth.user.clone());
        self.session = Some(auth.session.id);
        self.send_json(ctx, &OutgoingMessage::Session(session_payload(&auth)));
    }

    fn handle_signup(&mut self, msg: IncomingSignup, ctx: &mut ws::WebsocketContext<Self>) {
        let fut = auth::AuthActor::from_registry()
            .send(SpanMessage::new(auth::SignUp {
                email: msg.email,
                password: msg.password,
            }))
            .into_actor(self)
            .map(|res, act, ctx| match flatten(res) {
                Ok(session) => act.establish_session(ctx, session),
                Err(err) => act.send_error(ctx, err),
            });
        ctx.spawn(fut);
    }

    fn handle_login(&mut self, msg: IncomingLogin, ctx: &mut ws::WebsocketContext<Self>) {
        let fut = auth::AuthActor::from_registry()
            .send(SpanMessage::new(auth::SignIn {
                email: msg.email,
                password: msg.password,
            }))
            .into_actor(self)
            .map(|res, act, ctx| match flatten(res) {
                Ok(session) => act.establish_session(ctx, session),
                Err(err) => act.send_error(ctx, err),
            });
        ctx.spawn(fut);
    }

    fn handle_reconnect(&mut self, msg: IncomingReconnect, ctx: &mut ws::WebsocketContext<Self>) {
        let fut = auth::AuthActor::from_registry()
            .send(SpanMessage::new(auth::ResumeSession(msg.session_id)))
            .into_actor(self)
            .map(|res, act, ctx| match flatten(res) {
                Ok(session) => act.establish_session(ctx, session),
                Err(err) => act.send_error(ctx, err),
            });
        ctx.spawn(fut);
    }

    fn handle_logout(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        self.user = None;
        let session_id = match self.session.take() {
            Some(session_id) => session_id,
            None => {
                // Nothing to tear down server-side.
                self.send_json(ctx, &OutgoingMessage::LoggedOut);
                return;
            }
        };
        let fut = auth::AuthActor::from_registry()
            .send(SpanMessage::new(auth::SignOut(session_id)))
            .into_actor(self)
            .map(|res, act, ctx| match flatten(res) {
                Ok(()) => act.send_json(ctx, &OutgoingMessage::LoggedOut),
                Err(err) => act.send_error(ctx, err),
            });
        ctx.spawn(fut);
    }

    fn handle_create_poll(
        &mut self,
        msg: IncomingCreatePoll,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let user = match self.current_user() {
            Ok(user) => user,
            Err(err) => return self.send_error(ctx, err),
        };
        let draft = PollDraft {
            title: msg.title,
            description: msg.description,
            options: DraftOptions::from_rows(msg.options),
            expiration_date: msg.expiration_date,
        };
        let fut = poll::PollActor::from_registry()
            .send(SpanMessage::new(poll::CreateNewPoll { user, draft }))
            .into_actor(self)
            .map(|res, act, ctx| match flatten(res) {
                Ok(detail) => {
                    act.send_json(ctx, &OutgoingMessage::PollCreated(detail_payload(detail)))
                }
                Err(err) => act.send_error(ctx, err),
            });
        ctx.spawn(fut);
    }

    fn handle_vote(&mut self, msg: IncomingVote, ctx: &mut ws::WebsocketContext<Self>) {
        let user = match self.current_user() {
            Ok(user) => user,
            Err(err) => return self.send_error(ctx, err),
        };
        debug!("Incoming vote");
        let poll_id = msg.poll_id;
        let option_id = msg.option_id;
        let fut = async move {
            let vote = vote::VoteActor::from_registry()
                .send(SpanMessage::new(vote::CastVote {
                    user: user.clone(),
                    poll_id,
                    option_id,
                    now: Utc::now(),
                }))
                .await
                .map_err(ApiError::from)??;

            // Voters land on the refreshed results, like any other re-fetch.
            let detail = poll::PollActor::from_registry()
                .send(SpanMessage::new(poll::FetchPollDetail { poll_id, user }))
                .await
                .map_err(ApiError::from)??;

            Ok::<_, ApiError>((vote, detail))
        }
        .into_actor(self)
        .map(|res, act, ctx| match res {
            Ok((vote, detail)) => {
                act.send_json(
                    ctx,
                    &OutgoingMessage::VoteAccepted(OutgoingVoteAccepted {
                        poll_id: vote.poll_id,
                        option_id: vote.option_id,
                    }),
                );
                act.send_json(ctx, &OutgoingMessage::Poll(detail_payload(detail)));
            }
            Err(err) => act.send_error(ctx, err),
        });
        ctx.spawn(fut);
    }

    fn handle_dashboard(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let user = match self.current_user() {
            Ok(user) => user,
            Err(err) => return self.send_error(ctx, err),
        };
        let fut = poll::PollActor::from_registry()
            .send(SpanMessage::new(poll::FetchDashboard { user }))
            .into_actor(self)
            .map(|res, act, ctx| match flatten(res) {
                Ok(dashboard) => {
                    act.send_json(ctx, &OutgoingMessage::Dashboard(dashboard_payload(dashboard)))
                }
                Err(err) => act.send_error(ctx, err),
            });
        ctx.spawn(fut);
    }

    fn handle_poll_detail(
        &mut self,
        msg: IncomingPollRequest,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let user = match self.current_user() {
            Ok(user) => user,
            Err(err) => return self.send_error(ctx, err),
        };
        let fut = poll::PollActor::from_registry()
            .send(SpanMessage::new(poll::FetchPollDetail {
                poll_id: msg.poll_id,
                user,
            }))
            .into_actor(self)
            .map(|res, act, ctx| match flatten(res) {
                Ok(detail) => act.send_json(ctx, &OutgoingMessage::Poll(detail_payload(detail))),
                Err(err) => act.send_error(ctx, err),
            });
        ctx.spawn(fut);
    }

    fn handle_results(&mut self, msg: IncomingPollRequest, ctx: &mut ws::WebsocketContext<Self>) {
        let user = match self.current_user() {
            Ok(user) => user,
            Err(err) => return self.send_error(ctx, err),
        };
        let fut = poll::PollActor::from_registry()
            .send(SpanMessage::new(poll::FetchResults {
                poll_id: msg.poll_id,
                user,
            }))
            .into_actor(self)
            .map(|res, act, ctx| match flatten(res) {
                Ok(results) => {
                    act.send_json(ctx, &OutgoingMessage::Results(results_payload(results)))
                }
                Err(err) => act.send_error(ctx, err),
            });
        ctx.spawn(fut);
    }

    fn handle_delete_poll(
        &mut self,
        msg: IncomingPollRequest,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let user = match self.current_user() {
            Ok(user) => user,
            Err(err) => return self.send_error(ctx, err),
        };
        let fut = poll::PollActor::from_registry()
            .send(SpanMessage::new(poll::RemovePoll {
                poll_id: msg.poll_id,
                user,
            }))
            .into_actor(self)
            .map(|res, act, ctx| match flatten(res) {
                Ok(poll_id) => act.send_json(
                    ctx,
                    &OutgoingMessage::PollDeleted(OutgoingPollRef { poll_id }),
                ),
                Err(err) => act.send_error(ctx, err),
            });
        ctx.spawn(fut);
    }

    fn handle_profile(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let user = match self.current_user() {
            Ok(user) => user,
            Err(err) => return self.send_error(ctx, err),
        };
        let fut = poll::PollActor::from_registry()
            .send(SpanMessage::new(poll::FetchProfile { user }))
            .into_actor(self)
            .map(|res, act, ctx| match flatten(res) {
                Ok(stats) => act.send_json(
                    ctx,
                    &OutgoingMessage::Profile(OutgoingProfile {
                        email: stats.email,
                        polls_created: stats.polls_created,
                        polls_voted: stats.polls_voted,
                    }),
                ),
                Err(err) => act.send_error(ctx, err),
            });
        ctx.spawn(fut);
    }
}

impl Default for WsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for WsClient {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("New ws client");
        let addr = ctx.address();
        services::broadcast::BroadcastActor::from_registry().do_send(services::Connect { addr });
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        info!("Ws client left");
        let addr = ctx.address();
        services::broadcast::BroadcastActor::from_registry().do_send(services::Disconnect { addr });
    }
}

// Incoming messages from ws
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsClient {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(message) => match message {
                ws::Message::Text(text) => {
                    let parsed = match serde_json::from_str(&text) {
                        Ok(parsed) => parsed,
                        Err(serde_error) => {
                            debug!(
                                "Client sent invalid JSON: {error}",
                                error = serde_error.to_string()
                            );
                            self.send_error(
                                ctx,
                                ApiError::validation("Could not understand that request"),
                            );
                            return;
                        }
                    };
                    match parsed {
                        IncomingMessage::Signup(signup) => self.handle_signup(signup, ctx),
                        IncomingMessage::Login(login) => self.handle_login(login, ctx),
                        IncomingMessage::Logout => self.handle_logout(ctx),
                        IncomingMessage::Reconnect(reconnect) => {
                            self.handle_reconnect(reconnect, ctx)
                        }
                        IncomingMessage::CreatePoll(create) => self.handle_create_poll(create, ctx),
                        IncomingMessage::Vote(ballot) => self.handle_vote(ballot, ctx),
                        IncomingMessage::Dashboard => self.handle_dashboard(ctx),
                        IncomingMessage::Poll(request) => self.handle_poll_detail(request, ctx),
                        IncomingMessage::Results(request) => self.handle_results(request, ctx),
                        IncomingMessage::DeletePoll(request) => {
                            self.handle_delete_poll(request, ctx)
                        }
                        IncomingMessage::Profile => self.handle_profile(ctx),
                    }
                }
                ws::Message::Close(reason) => {
                    debug!("Got close message from WS");
                    ctx.close(reason)
                }
                message => {
                    warn!(
                        "Client sent something else than text: {message}",
                        message = format!("{:?}", message)
                    );
                }
            },
            Err(err) => {
                error!(
                    "ProtocolError in StreamHandler {error}",
                    error = format!("{:?}", err)
                );
            }
        }
    }
}

impl Handler<services::broadcast::PollUpdated> for WsClient {
    type Result = ();

    fn handle(
        &mut self,
        msg: services::broadcast::PollUpdated,
        ctx: &mut Self::Context,
    ) -> Self::Result {
        self.send_json(
            ctx,
            &OutgoingMessage::PollUpdated(OutgoingPollRef { poll_id: msg.0 }),
        )
    }
}

impl Handler<services::broadcast::PollRemoved> for WsClient {
    type Result = ();

    fn handle(
        &mut self,
        msg: services::broadcast::PollRemoved,
        ctx: &mut Self::Context,
    ) -> Self::Result {
        self.send_json(
            ctx,
            &OutgoingMessage::PollRemoved(OutgoingPollRef { poll_id: msg.0 }),
        )
    }
}
