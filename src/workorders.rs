// ABOUTME: Work order routes: generate, list, create, send, status, update, delete
// ABOUTME: Every mutation is guarded by ownership; the master token bypasses the guard

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::email::OutboundEmail;
use crate::entities::work_order;
use crate::error::{AppError, Result};
use crate::generate::generate_workorder_email;
use crate::identity::{Principal, require_user};
use crate::storage::Storage;
use crate::types::{
    CreateWorkOrderRequest, GenerateWorkOrderRequest, SendWorkOrderQuery, SetStatusRequest,
};

async fn find_and_validate(
    storage: &Storage,
    workorder_id: Uuid,
    user_id: Uuid,
    skip_owner_check: bool,
) -> Result<work_order::Model> {
    let workorder = storage
        .get_work_order(workorder_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Workorder not found".to_string()))?;

    if !skip_owner_check && workorder.owner_id != user_id {
        return Err(AppError::Forbidden(
            "You do not have permission to access this workorder".to_string(),
        ));
    }

    Ok(workorder)
}

pub async fn generate(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<GenerateWorkOrderRequest>,
) -> Result<Json<Value>> {
    payload.validate()?;

    let user = require_user(&state.storage, &principal).await?;
    let from_name = match payload.from_name {
        Some(name) if !name.trim().is_empty() => name,
        _ => {
            let full = format!(
                "{} {}",
                user.first_name.as_deref().unwrap_or_default(),
                user.last_name.as_deref().unwrap_or_default()
            );
            let full = full.trim().to_string();
            if full.is_empty() { user.email.clone() } else { full }
        }
    };

    tracing::info!(email = %user.email, "work order email generation request");

    let email = generate_workorder_email(
        &state.openai,
        &state.locations,
        payload.image_b64.as_deref(),
        payload.audio_b64.as_deref(),
        &from_name,
    )
    .await?;

    Ok(Json(json!({ "email": email })))
}

pub async fn list(State(state): State<AppState>, principal: Principal) -> Result<Json<Value>> {
    let user = require_user(&state.storage, &principal).await?;
    let workorders = state.storage.work_orders_for_user(user.id).await?;
    Ok(Json(json!({ "workorders": workorders })))
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CreateWorkOrderRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let user = require_user(&state.storage, &principal).await?;
    let workorder = state
        .storage
        .create_work_order(user.id, &payload.email_subject, &payload.email_body)
        .await?;

    tracing::info!(user_id = %user.id, workorder_id = %workorder.id, "created workorder");
    Ok((StatusCode::CREATED, Json(json!({ "workorder": workorder }))))
}

/// Email the work order to its owner (or an explicit address) and move it to
/// pending.
pub async fn send(
    State(state): State<AppState>,
    principal: Principal,
    Path(workorder_id): Path<Uuid>,
    Query(query): Query<SendWorkOrderQuery>,
) -> Result<Json<Value>> {
    query.validate()?;

    let user = require_user(&state.storage, &principal).await?;
    let workorder = find_and_validate(
        &state.storage,
        workorder_id,
        user.id,
        principal.is_master_token,
    )
    .await?;

    let recipient = query.email.unwrap_or_else(|| user.email.clone());
    state
        .mailer
        .send(OutboundEmail {
            to: recipient,
            subject: workorder.email_subject.clone(),
            text: Some(workorder.email_body.clone()),
            html: None,
        })
        .await?;

    let updated = state
        .storage
        .set_work_order_status(workorder_id, work_order::WorkOrderStatus::Pending)
        .await?
        .ok_or_else(|| AppError::NotFound("Workorder not found".to_string()))?;

    tracing::info!(workorder_id = %workorder_id, "workorder sent");
    Ok(Json(json!({ "workorder": updated })))
}

pub async fn set_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(workorder_id): Path<Uuid>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<Json<Value>> {
    let user = require_user(&state.storage, &principal).await?;
    find_and_validate(
        &state.storage,
        workorder_id,
        user.id,
        principal.is_master_token,
    )
    .await?;

    let updated = state
        .storage
        .set_work_order_status(workorder_id, payload.status)
        .await?
        .ok_or_else(|| AppError::NotFound("Workorder not found".to_string()))?;

    Ok(Json(json!({ "workorder": updated })))
}

pub async fn complete(
    State(state): State<AppState>,
    principal: Principal,
    Path(workorder_id): Path<Uuid>,
) -> Result<Json<Value>> {
    let user = require_user(&state.storage, &principal).await?;
    find_and_validate(
        &state.storage,
        workorder_id,
        user.id,
        principal.is_master_token,
    )
    .await?;

    let updated = state
        .storage
        .set_work_order_status(workorder_id, work_order::WorkOrderStatus::Done)
        .await?
        .ok_or_else(|| AppError::NotFound("Workorder not found".to_string()))?;

    Ok(Json(json!({ "workorder": updated })))
}

pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(workorder_id): Path<Uuid>,
    Json(payload): Json<CreateWorkOrderRequest>,
) -> Result<Json<Value>> {
    payload.validate()?;

    let user = require_user(&state.storage, &principal).await?;
    find_and_validate(
        &state.storage,
        workorder_id,
        user.id,
        principal.is_master_token,
    )
    .await?;

    let updated = state
        .storage
        .update_work_order(workorder_id, &payload.email_subject, &payload.email_body)
        .await?
        .ok_or_else(|| AppError::NotFound("Workorder not found".to_string()))?;

    Ok(Json(json!({ "workorder": updated })))
}

pub async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    Path(workorder_id): Path<Uuid>,
) -> Result<Json<Value>> {
    let user = require_user(&state.storage, &principal).await?;
    find_and_validate(
        &state.storage,
        workorder_id,
        user.id,
        principal.is_master_token,
    )
    .await?;

    state.storage.delete_work_order(workorder_id).await?;

    tracing::info!(workorder_id = %workorder_id, "workorder deleted");
    Ok(Json(json!({ "message": "Workorder deleted successfully" })))
}
