use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    extract::{FromRequestParts, Path, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use boxoffice_types::api::AssignRequest;

use crate::auth::{AppState, AppStateInner};
use crate::error::ApiError;

/// Largest body the gate will buffer to find a resource owner.
const MAX_OWNER_BODY_BYTES: usize = 64 * 1024;

/// Identity resolved from a verified bearer token, stored in request extensions.
#[derive(Debug, Clone)]
pub struct Identity {
    pub username: String,
}

/// The lookups capability predicates are built from.
pub trait CapabilityCheck: Send + Sync + 'static {
    fn is_admin(&self, username: &str) -> bool;
    fn is_same_user(&self, username: &str, owner_id: i64) -> bool;
}

impl CapabilityCheck for AppStateInner {
    fn is_admin(&self, username: &str) -> bool {
        self.db.is_admin(username)
    }

    fn is_same_user(&self, username: &str, owner_id: i64) -> bool {
        self.db.is_same_user(username, owner_id)
    }
}

/// Where the id of the resource owner is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// The `{id}` path segment.
    PathId,
    /// The `userId` field of a JSON body.
    BodyUserId,
}

/// What a route demands of the caller beyond a valid token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Admin,
    SelfOrAdmin(Owner),
}

impl Capability {
    /// `owner_id` is `None` when the owner could not be determined; that always denies.
    pub fn allows<C>(&self, checks: &C, username: &str, owner_id: Option<i64>) -> bool
    where
        C: CapabilityCheck + ?Sized,
    {
        match self {
            Capability::Admin => checks.is_admin(username),
            Capability::SelfOrAdmin(_) => match owner_id {
                Some(id) => checks.is_same_user(username, id) || checks.is_admin(username),
                None => false,
            },
        }
    }
}

/// State for [`authorize`]: the predicate and what it is evaluated against.
#[derive(Clone)]
pub struct Gate {
    checks: Arc<dyn CapabilityCheck>,
    capability: Capability,
}

impl Gate {
    pub fn new(checks: Arc<dyn CapabilityCheck>, capability: Capability) -> Self {
        Self { checks, capability }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extract and validate the JWT from the Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or_else(|| {
        ApiError::Unauthorized("request does not contain an access token".into())
    })?;

    let username = state.tokens.verify(token).map_err(|e| {
        debug!("token rejected: {}", e);
        ApiError::Unauthorized("invalid token, you dont have permission for this route".into())
    })?;

    req.extensions_mut().insert(Identity { username });
    Ok(next.run(req).await)
}

/// Evaluate the gate's capability for the identity `require_auth` resolved.
/// Anything that prevents a clean `true` denies.
pub async fn authorize(
    State(gate): State<Gate>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(identity) = req.extensions().get::<Identity>().cloned() else {
        return Err(ApiError::unauthorized());
    };

    let (req, owner_id) = match gate.capability {
        Capability::Admin => (req, None),
        Capability::SelfOrAdmin(Owner::PathId) => {
            let (mut parts, body) = req.into_parts();
            let owner_id = owner_from_path(&mut parts).await;
            (Request::from_parts(parts, body), owner_id)
        }
        Capability::SelfOrAdmin(Owner::BodyUserId) => owner_from_body(req).await?,
    };

    let capability = gate.capability;
    let checks = gate.checks.clone();
    let username = identity.username.clone();
    let allowed = tokio::task::spawn_blocking(move || capability.allows(&*checks, &username, owner_id))
        .await
        .unwrap_or_else(|e| {
            warn!("capability check panicked: {}", e);
            false
        });

    if !allowed {
        warn!("{} denied {:?} on {}", identity.username, gate.capability, req.uri().path());
        return Err(ApiError::unauthorized());
    }

    Ok(next.run(req).await)
}

async fn owner_from_path(parts: &mut Parts) -> Option<i64> {
    let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, &())
        .await
        .ok()?;
    params.get("id")?.parse().ok()
}

/// Buffer the body to read `userId`, then put the bytes back for the handler.
async fn owner_from_body(req: Request) -> Result<(Request, Option<i64>), ApiError> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_OWNER_BODY_BYTES)
        .await
        .map_err(|_| ApiError::unauthorized())?;

    let owner_id = serde_json::from_slice::<AssignRequest>(&bytes)
        .ok()
        .map(|r| r.user_id)
        .filter(|id| *id != 0);

    Ok((Request::from_parts(parts, Body::from(bytes)), owner_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// alice (id 1) is a plain user, root (id 2) is an admin.
    struct Fixed;

    impl CapabilityCheck for Fixed {
        fn is_admin(&self, username: &str) -> bool {
            username == "root"
        }

        fn is_same_user(&self, username: &str, owner_id: i64) -> bool {
            matches!((username, owner_id), ("alice", 1) | ("root", 2))
        }
    }

    #[test]
    fn admin_capability() {
        assert!(Capability::Admin.allows(&Fixed, "root", None));
        assert!(!Capability::Admin.allows(&Fixed, "alice", None));
        assert!(!Capability::Admin.allows(&Fixed, "mallory", None));
    }

    #[test]
    fn self_or_admin_capability() {
        let cap = Capability::SelfOrAdmin(Owner::PathId);

        assert!(cap.allows(&Fixed, "alice", Some(1)));
        assert!(!cap.allows(&Fixed, "alice", Some(2)));
        assert!(cap.allows(&Fixed, "root", Some(1)));
        assert!(cap.allows(&Fixed, "root", Some(999)));
    }

    #[test]
    fn unknown_owner_denies_everyone() {
        let cap = Capability::SelfOrAdmin(Owner::BodyUserId);
        assert!(!cap.allows(&Fixed, "alice", None));
        assert!(!cap.allows(&Fixed, "root", None));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }
}
