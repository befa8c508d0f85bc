//! Caller identity and the access rules of the cart surface.
//!
//! Tokens are issued elsewhere; this module only resolves an
//! `Authorization: Token <key>` header into an [`Identity`] and decides,
//! per [`CartAction`], whether that identity may proceed.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::ShopError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn user(user_id: Uuid) -> Self { Self { user_id, role: Role::User } }
    pub fn admin(user_id: Uuid) -> Self { Self { user_id, role: Role::Admin } }
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessRule {
    Authenticated,
    OwnerOrAdmin,
}

/// Every operation of the cart surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CartAction {
    List,
    Create,
    Update,
    Delete,
    Summary,
    Reduce,
    Clear,
}

impl CartAction {
    pub const fn rule(self) -> AccessRule {
        match self {
            Self::Update | Self::Delete => AccessRule::OwnerOrAdmin,
            Self::List | Self::Create | Self::Summary | Self::Reduce | Self::Clear => AccessRule::Authenticated,
        }
    }

    /// Gate on the caller alone. Owner checks happen once the target line is known.
    pub fn admit(self, caller: Option<Identity>) -> Result<Identity, ShopError> {
        let who = caller.ok_or(ShopError::Unauthorized)?;
        tracing::debug!(action = ?self, user_id = %who.user_id, "cart action admitted");
        Ok(who)
    }

    pub fn check_owner(self, who: &Identity, owner: Uuid) -> Result<(), ShopError> {
        match self.rule() {
            AccessRule::Authenticated => Ok(()),
            AccessRule::OwnerOrAdmin if who.is_admin() || who.user_id == owner => Ok(()),
            AccessRule::OwnerOrAdmin => {
                tracing::warn!(action = ?self, user_id = %who.user_id, %owner, "non-owner cart mutation rejected");
                Err(ShopError::Forbidden)
            }
        }
    }
}

/// The optional caller of a request. Absent header means anonymous; a header
/// that does not resolve is rejected outright.
#[derive(Clone, Copy, Debug)]
pub struct Caller(pub Option<Identity>);

pub fn token_from_header(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    match scheme {
        "Token" | "Bearer" if !token.is_empty() => Some(token),
        _ => None,
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ShopError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Caller(None));
        };
        let token = header.to_str().ok().and_then(token_from_header).ok_or_else(|| {
            tracing::warn!(uri = %parts.uri, "malformed authorization header");
            ShopError::Unauthorized
        })?;
        match state.identities.resolve_token(token).await? {
            Some(identity) => Ok(Caller(Some(identity))),
            None => {
                tracing::warn!(uri = %parts.uri, "unknown auth token");
                Err(ShopError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_are_static_per_action() {
        assert_eq!(CartAction::Update.rule(), AccessRule::OwnerOrAdmin);
        assert_eq!(CartAction::Delete.rule(), AccessRule::OwnerOrAdmin);
        assert_eq!(CartAction::Create.rule(), AccessRule::Authenticated);
        assert_eq!(CartAction::Clear.rule(), AccessRule::Authenticated);
    }

    #[test]
    fn test_anonymous_rejected() {
        assert!(matches!(CartAction::List.admit(None), Err(ShopError::Unauthorized)));
    }

    #[test]
    fn test_owner_check() {
        let owner = Uuid::new_v4();
        let stranger = Identity::user(Uuid::new_v4());
        assert!(CartAction::Update.check_owner(&Identity::user(owner), owner).is_ok());
        assert!(matches!(CartAction::Delete.check_owner(&stranger, owner), Err(ShopError::Forbidden)));
        assert!(CartAction::Delete.check_owner(&Identity::admin(Uuid::new_v4()), owner).is_ok());
    }

    #[test]
    fn test_token_from_header() {
        assert_eq!(token_from_header("Token abc123"), Some("abc123"));
        assert_eq!(token_from_header("Bearer abc123"), Some("abc123"));
        assert_eq!(token_from_header("Basic abc123"), None);
        assert_eq!(token_from_header("Token "), None);
        assert_eq!(token_from_header("abc123"), None);
    }
}
