// ABOUTME: Magic-link sign-in flow and profile routes
// ABOUTME: Requesting a link lazily creates the account; login sets the auth cookie

use axum::{
    Json,
    extract::{Query, State},
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{Value, json};
use validator::Validate;

use crate::AppState;
use crate::email::OutboundEmail;
use crate::error::{AppError, Result};
use crate::identity::{Principal, require_user};
use crate::session;
use crate::types::{LoginQuery, MagicSignInRequest, UpdateProfileRequest};

pub async fn magic_sign_in(
    State(state): State<AppState>,
    Json(payload): Json<MagicSignInRequest>,
) -> Result<Json<Value>> {
    payload.validate()?;

    let user = state.storage.get_or_create_user(&payload.email).await?;
    let token = session::sign_token(
        &user.email,
        &state.config.jwt_secret,
        session::MAGIC_LINK_MAX_AGE,
    )?;

    let magic_link = format!(
        "{}/api/auth/login?token={}&redirectUrl={}",
        state.config.base_url.trim_end_matches('/'),
        token,
        urlencoding::encode(&payload.redirect_url),
    );

    state
        .mailer
        .send(OutboundEmail {
            to: user.email.clone(),
            subject: "Your Fix It Wand Magic Link".to_string(),
            text: None,
            html: Some(magic_link_email(&magic_link)),
        })
        .await?;

    tracing::info!(email = %user.email, "magic link sent");
    Ok(Json(json!({
        "message": "Magic link sent to your email",
        "user": user,
    })))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<LoginQuery>,
) -> Result<(CookieJar, Redirect)> {
    let claims = session::verify_token(&query.token, &state.config.jwt_secret)?;

    // Clicking the emailed link proves control of the mailbox
    let user = state.storage.get_or_create_user(&claims.email).await?;
    state.storage.mark_email_verified(user.id).await?;

    let token = session::sign_token(
        &user.email,
        &state.config.jwt_secret,
        session::SESSION_MAX_AGE,
    )?;
    let secure = state.config.base_url.starts_with("https://");
    let jar = jar.add(session::create_session_cookie(token, secure));

    tracing::info!(email = %user.email, "user logged in with magic link");
    Ok((jar, Redirect::to(&query.redirect_url)))
}

pub async fn me(State(state): State<AppState>, principal: Principal) -> Result<Json<Value>> {
    let user = require_user(&state.storage, &principal).await?;
    Ok(Json(json!({ "user": user })))
}

pub async fn update_me(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Value>> {
    payload.validate()?;

    let user = require_user(&state.storage, &principal).await?;
    let updated = state
        .storage
        .update_profile(user.id, payload.first_name, payload.last_name)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({ "user": updated })))
}

pub async fn logout(jar: CookieJar) -> Result<(CookieJar, Json<Value>)> {
    let jar = jar.add(session::create_logout_cookie());
    Ok((
        jar,
        Json(json!({ "success": true, "message": "Logged out successfully" })),
    ))
}

fn magic_link_email(magic_link: &str) -> String {
    format!(
        "<html><body>\
         <h2>Sign in to Fix It Wand</h2>\
         <p>Click the link below to sign in. It expires in 15 minutes.</p>\
         <p><a href=\"{link}\">Sign in to Fix It Wand</a></p>\
         <p>If you did not request this link you can safely ignore this email.</p>\
         </body></html>",
        link = magic_link
    )
}
