//! Current actor extractor.
//!
//! Authentication happens upstream; the gateway forwards the authenticated user as the
//! `x-actor-id` and `x-actor-role` headers. Handlers take [`Actor`] when a caller is required
//! and `Option<Actor>` when the route is public.

use crate::{entities::Role, errors::{Error, Result}};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use tracing::debug;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    /// Staff and admins pass.
    pub fn require_staff(&self) -> Result<()> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(Error::forbidden("Staff access required"))
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(Error::forbidden("Admin access required"))
        }
    }
}

fn parse_role(value: &str) -> Option<Role> {
    match value.trim().to_ascii_uppercase().as_str() {
        "CUSTOMER" => Some(Role::Customer),
        "STAFF" => Some(Role::Staff),
        "ADMIN" => Some(Role::Admin),
        _ => None,
    }
}

/// Reads the actor headers; `None` when neither header is present.
fn actor_from_headers(parts: &Parts) -> Result<Option<Actor>> {
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    };

    let (id, role) = match (header(ACTOR_ID_HEADER), header(ACTOR_ROLE_HEADER)) {
        (None, None) => return Ok(None),
        (Some(id), Some(role)) => (id, role),
        _ => {
            debug!(uri = %parts.uri, "Incomplete actor headers");
            return Err(Error::Unauthenticated);
        }
    };

    let id = id.trim().parse::<i64>().map_err(|_| Error::Unauthenticated)?;
    let role = parse_role(role).ok_or(Error::Unauthenticated)?;
    Ok(Some(Actor { id, role }))
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        actor_from_headers(parts)?.ok_or(Error::Unauthenticated)
    }
}

impl<S> OptionalFromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>> {
        actor_from_headers(parts)
    }
}
