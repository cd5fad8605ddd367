/*!
 * # Authorization Module
 *
 * Identifies the calling actor from request headers and decides whether the
 * actor may perform an action. Authentication itself happens upstream; this
 * service trusts the `x-user-id` / `x-user-roles` headers set by the gateway.
 */

use crate::errors::ServiceError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod policy;

pub use policy::{Action, Policy, Role, RolePolicy};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(user_id: Uuid, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            user_id,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Actor used by the CLI and startup bootstrap.
    pub fn system() -> Self {
        Self::new(Uuid::nil(), ["admin"])
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;

        let user_id = Uuid::parse_str(user_id.trim()).map_err(|_| {
            ServiceError::Unauthorized(format!("{} must be a UUID", USER_ID_HEADER))
        })?;

        let roles = parts
            .headers
            .get(USER_ROLES_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(parse_roles)
            .unwrap_or_default();

        Ok(Actor { user_id, roles })
    }
}

fn parse_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|r| r.trim().to_ascii_lowercase())
        .filter(|r| !r.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<Actor, ServiceError> {
        let (mut parts, _) = req.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn actor_is_read_from_headers() {
        let id = Uuid::new_v4();
        let req = Request::builder()
            .header(USER_ID_HEADER, id.to_string())
            .header(USER_ROLES_HEADER, "Manager, warehouse,,")
            .body(())
            .unwrap();

        let actor = extract(req).await.unwrap();
        assert_eq!(actor.user_id, id);
        assert_eq!(actor.roles, vec!["manager", "warehouse"]);
    }

    #[tokio::test]
    async fn missing_or_malformed_user_is_unauthorized() {
        let req = Request::builder().body(()).unwrap();
        assert!(matches!(extract(req).await, Err(ServiceError::Unauthorized(_))));

        let req = Request::builder()
            .header(USER_ID_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(matches!(extract(req).await, Err(ServiceError::Unauthorized(_))));
    }
}
