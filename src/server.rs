use crate::db::DbExecutor;
use crate::services::auth::AuthActor;
use crate::services::broadcast::BroadcastActor;
use crate::services::poll::PollActor;
use crate::services::vote::VoteActor;
use crate::websocket;
use actix::prelude::*;
use actix::registry::SystemRegistry;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use sqlx::PgPool;

async fn ws_route(req: HttpRequest, stream: web::Payload) -> Result<HttpResponse, Error> {
    ws::start(websocket::WsClient::new(), &req, stream)
}

/// The db actor carries the pool and cannot start itself; seed the
/// registry before anything sends it a message.
pub fn register_db_actor(pool: PgPool) {
    SystemRegistry::set(DbExecutor(pool).start());
}

pub fn register_system_actors() {
    SystemRegistry::set(AuthActor::default().start());
    SystemRegistry::set(PollActor::default().start());
    SystemRegistry::set(VoteActor::default().start());
    SystemRegistry::set(BroadcastActor::new().start());
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // websocket
    cfg.service(web::resource("/ws/").to(ws_route));
}
