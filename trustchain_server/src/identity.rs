//! Caller identity.
//!
//! Authentication happens upstream. The identity provider in front of the server sets `tc-user-id` and
//! `tc-user-role` on every request it forwards, and the server trusts them as supplied.
use std::{
    future::{ready, Ready},
    str::FromStr,
    sync::OnceLock,
};

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpMessage, HttpRequest};
use log::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use trustchain_engine::db_types::Role;

use crate::errors::ServerError;

pub const USER_ID_HEADER: &str = "tc-user-id";
pub const USER_ROLE_HEADER: &str = "tc-user-role";

fn user_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:@|-]{0,127}$").expect("User id pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new<S: Into<String>>(user_id: S, role: Role) -> Self {
        Self { user_id: user_id.into(), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.is_empty() || roles.contains(&self.role)
    }

    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ServerError> {
        let user_id = header_value(headers, USER_ID_HEADER)?;
        if !user_id_pattern().is_match(user_id) {
            return Err(ServerError::MissingIdentity(format!("{user_id} is not a valid user id")));
        }
        let role = header_value(headers, USER_ROLE_HEADER)?;
        let role = Role::from_str(&role.to_ascii_lowercase()).map_err(|e| ServerError::MissingIdentity(e.to_string()))?;
        Ok(Self::new(user_id, role))
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ServerError> {
    headers
        .get(name)
        .ok_or_else(|| ServerError::MissingIdentity(format!("The {name} header is required")))?
        .to_str()
        .map(str::trim)
        .map_err(|e| ServerError::MissingIdentity(format!("{name} could not be read. {e}")))
}

/// Prefers the identity already validated by the ACL middleware, and falls back to parsing the headers.
impl FromRequest for Identity {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        if let Some(identity) = req.extensions().get::<Identity>() {
            return ready(Ok(identity.clone()));
        }
        let result = Identity::from_headers(req.headers());
        if let Err(e) = &result {
            debug!("💻️ Rejecting request to {}. {e}", req.path());
        }
        ready(result)
    }
}
