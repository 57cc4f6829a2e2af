use super::{Connect, Disconnect};
use crate::db::poll::PollId;
use crate::websocket::WsClient;
use actix::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info};

/// Fired after a successful vote. Connected clients re-fetch whatever
/// screen currently shows the poll; no tallies travel in the nudge.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct PollUpdated(pub PollId);

/// Fired after a poll deletion so open dashboards can drop it.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct PollRemoved(pub PollId);

#[derive(Default)]
pub struct BroadcastActor {
    clients: HashSet<Addr<WsClient>>,
}

impl BroadcastActor {
    pub fn new() -> Self {
        BroadcastActor {
            clients: HashSet::new(),
        }
    }
}

impl Actor for BroadcastActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("Broadcast actor started");
    }
}

impl Handler<Connect> for BroadcastActor {
    type Result = ();

    fn handle(&mut self, msg: Connect, _ctx: &mut Context<Self>) -> Self::Result {
        debug!("Adding new client to broadcast");
        self.clients.insert(msg.addr);
    }
}

impl Handler<Disconnect> for BroadcastActor {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _ctx: &mut Context<Self>) -> Self::Result {
        debug!("Removing client from broadcast");
        self.clients.remove(&msg.addr);
    }
}

macro_rules! broadcast_handler {
    ($message_type:ident) => {
        impl Handler<$message_type> for BroadcastActor {
            type Result = ();

            fn handle(&mut self, msg: $message_type, _ctx: &mut Context<Self>) -> Self::Result {
                debug!(
                    "Broadcasting {kind} to {clients} clients",
                    kind = stringify!($message_type),
                    clients = self.clients.len()
                );
                for client in &self.clients {
                    client.do_send(msg.clone());
                }
            }
        }
    };
}

broadcast_handler!(PollUpdated);
broadcast_handler!(PollRemoved);

impl SystemService for BroadcastActor {}
impl Supervised for BroadcastActor {}
