use crate::db::user::UserId;
use crate::websocket::WsClient;
use actix::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod auth;
pub mod broadcast;
pub mod poll;
pub mod vote;

/// The connection's authenticated identity. Built once per login and
/// passed explicitly in every service message; there is no ambient
/// current-user global.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
}

#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct Connect {
    pub addr: Addr<WsClient>,
}

impl fmt::Debug for Connect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connect").finish()
    }
}

#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub addr: Addr<WsClient>,
}
