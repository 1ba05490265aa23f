// ABOUTME: Device identity middleware resolving one principal per request
// ABOUTME: Tries session JWT, master bearer token, then Wand-Id header in fixed order

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::user;
use crate::error::{AppError, Result};
use crate::session;
use crate::storage::Storage;
use crate::AppState;

/// Opaque device credential header presented by the physical wand.
pub const WAND_ID_HEADER: &str = "wand-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

/// Resolved request identity, attached as a request extension by the
/// authentication middleware.
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
    pub role: Role,
    /// Account email, when the credential resolves to one. An unpaired wand
    /// yields None so downstream ownership checks fail closed.
    pub email: Option<String>,
    pub is_master_token: bool,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| AppError::AuthRequired("request not authenticated".to_string()))
    }
}

/// Credential channels, evaluated in fixed priority order: the session token
/// is strongest and most common; the master bearer represents trusted-operator
/// intent; the wand header is the low-assurance device channel.
#[derive(Debug, Clone, Copy)]
enum CredentialChannel {
    Session,
    Master,
    WandHeader,
}

const CHANNEL_ORDER: [CredentialChannel; 3] = [
    CredentialChannel::Session,
    CredentialChannel::Master,
    CredentialChannel::WandHeader,
];

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let mut principal = None;

    for channel in CHANNEL_ORDER {
        principal = match channel {
            CredentialChannel::Session => try_session(request.headers(), &state.config)?,
            CredentialChannel::Master => try_master(request.headers(), &state.config)?,
            CredentialChannel::WandHeader => {
                try_wand_header(request.headers(), &state.storage).await?
            }
        };
        if principal.is_some() {
            break;
        }
    }

    let Some(principal) = principal else {
        return Err(if state.config.master_bearer.is_none() {
            AppError::MasterNotConfigured
        } else {
            AppError::AuthRequired("no valid credential presented".to_string())
        });
    };

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Session JWT from the auth cookie or an Authorization bearer token.
fn try_session(headers: &HeaderMap, config: &AppConfig) -> Result<Option<Principal>> {
    let jar = CookieJar::from_headers(headers);
    let token = match session::token_from_jar(&jar).or_else(|| bearer_token(headers)) {
        Some(token) => token,
        None => return Ok(None),
    };

    let Ok(claims) = session::verify_token(&token, &config.jwt_secret) else {
        // Not a valid session token; a later channel may still match it
        return Ok(None);
    };

    Ok(Some(Principal {
        subject: claims.email.clone(),
        role: Role::User,
        email: Some(claims.email),
        is_master_token: false,
    }))
}

/// Static operator bearer token, compared by SHA-256 digest so the
/// comparison cost does not depend on how much of the secret matches.
fn try_master(headers: &HeaderMap, config: &AppConfig) -> Result<Option<Principal>> {
    let Some(master) = &config.master_bearer else {
        return Ok(None);
    };
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };

    if !digest_eq(&token, master) {
        return Ok(None);
    }

    Ok(Some(Principal {
        subject: "master".to_string(),
        role: Role::Admin,
        email: Some(config.master_email.clone()),
        is_master_token: true,
    }))
}

/// Wand-Id header, looked up against the registry. A paired wand resolves to
/// its owner's email; an unpaired one yields a principal without an email.
async fn try_wand_header(headers: &HeaderMap, storage: &Storage) -> Result<Option<Principal>> {
    let Some(raw) = headers.get(WAND_ID_HEADER).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };
    let Ok(wand_id) = raw.parse::<Uuid>() else {
        return Ok(None);
    };
    let Some((wand, owner)) = storage.get_wand_with_owner(wand_id).await? else {
        return Ok(None);
    };

    Ok(Some(Principal {
        subject: wand.id.to_string(),
        role: Role::User,
        email: owner.map(|u| u.email),
        is_master_token: false,
    }))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

fn digest_eq(a: &str, b: &str) -> bool {
    Sha256::digest(a.as_bytes()) == Sha256::digest(b.as_bytes())
}

/// Resolve the principal to its account row. Fails closed for principals
/// without an email (unpaired wands) and for emails with no account.
pub async fn require_user(storage: &Storage, principal: &Principal) -> Result<user::Model> {
    let Some(email) = principal.email.as_deref() else {
        return Err(AppError::Forbidden(
            "caller is not associated with a user account".to_string(),
        ));
    };

    storage
        .get_user_by_email(email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_eq() {
        assert!(digest_eq("secret-token", "secret-token"));
        assert!(!digest_eq("secret-token", "secret-tokem"));
        assert!(!digest_eq("secret-token", "secret"));
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer abc123".parse().unwrap(),
        );
        assert_eq!(bearer_token(&headers), Some("abc123".to_string()));

        let mut basic = HeaderMap::new();
        basic.insert(
            axum::http::header::AUTHORIZATION,
            "Basic abc123".parse().unwrap(),
        );
        assert_eq!(bearer_token(&basic), None);
    }
}
