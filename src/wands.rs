// ABOUTME: HTTP surface for the wand pairing flow
// ABOUTME: GET associate issues the pending wand and code, POST attempts verification

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::error::{AppError, Result};
use crate::identity::{Principal, require_user};
use crate::pairing;
use crate::types::{
    AssociateWandRequest, AssociateWandResponse, WandDetailResponse, WandPairingResponse,
};

/// Return the caller's pending wand, creating one if none exists. Repeated
/// requests return the same wand and code.
pub async fn begin_association(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<WandPairingResponse>> {
    let user = require_user(&state.storage, &principal).await?;
    let wand = pairing::get_or_create_pending_wand(&state.storage, user.id).await?;

    let code = wand.verification_code.clone().unwrap_or_default();
    Ok(Json(WandPairingResponse {
        wand_id: wand.id,
        mnemonic: pairing::mnemonic_for_code(&code),
        verification_code: code,
        verified: wand.verified,
    }))
}

/// Attempt the pending -> verified transition with a candidate code.
pub async fn confirm_association(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<AssociateWandRequest>,
) -> Result<Json<AssociateWandResponse>> {
    payload.validate()?;

    // A session caller may only confirm a wand reserved for them; the master
    // token bypasses the ownership check. Existence is checked first so an
    // unknown wand still reports not-found.
    if !principal.is_admin() {
        if let Some(wand) = state.storage.get_wand(payload.wand_id).await? {
            if let Some(owner_id) = wand.owner_id {
                let user = require_user(&state.storage, &principal).await?;
                if owner_id != user.id {
                    return Err(AppError::Forbidden(
                        "This wand does not belong to you".to_string(),
                    ));
                }
            }
        }
    }

    let wand = pairing::confirm(&state.storage, payload.wand_id, &payload.verification_code).await?;

    Ok(Json(AssociateWandResponse {
        wand_id: wand.id,
        verified: wand.verified,
        message: "Wand successfully associated".to_string(),
    }))
}

/// Wand detail for its owner, including the current verification code.
pub async fn get_wand(
    State(state): State<AppState>,
    principal: Principal,
    Path(wand_id): Path<Uuid>,
) -> Result<Json<WandDetailResponse>> {
    let wand = state
        .storage
        .get_wand(wand_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("wand {} does not exist", wand_id)))?;

    if !principal.is_admin() {
        let user = require_user(&state.storage, &principal).await?;
        if wand.owner_id != Some(user.id) {
            return Err(AppError::Forbidden(
                "This wand does not belong to you".to_string(),
            ));
        }
    }

    Ok(Json(WandDetailResponse {
        id: wand.id,
        verified: wand.verified,
        verification_code: wand.verification_code,
        created_at: wand.created_at,
        owner: wand.owner_id,
    }))
}
