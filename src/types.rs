// ABOUTME: Type definitions for API requests, responses, and internal data structures
// ABOUTME: Request bodies carry validator derives so shape checks happen at the boundary

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::entities::work_order::WorkOrderStatus;

fn default_redirect() -> String {
    "/".to_string()
}

// Auth

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MagicSignInRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[serde(default = "default_redirect")]
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginQuery {
    pub token: String,
    #[serde(default = "default_redirect")]
    pub redirect_url: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

// Wand pairing

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssociateWandRequest {
    pub wand_id: Uuid,
    #[validate(length(min = 1, message = "Verification code is required"))]
    pub verification_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WandPairingResponse {
    pub wand_id: Uuid,
    pub verification_code: String,
    pub mnemonic: String,
    pub verified: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociateWandResponse {
    pub wand_id: Uuid,
    pub verified: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WandDetailResponse {
    pub id: Uuid,
    pub verified: bool,
    pub verification_code: Option<String>,
    pub created_at: i64,
    pub owner: Option<Uuid>,
}

// Work orders

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWorkOrderRequest {
    pub image_b64: Option<String>,
    pub audio_b64: Option<String>,
    pub from_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkOrderRequest {
    #[validate(length(min = 1, message = "Email subject is required"))]
    pub email_subject: String,
    #[validate(length(min = 1, message = "Email body is required"))]
    pub email_body: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendWorkOrderQuery {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: WorkOrderStatus,
}

/// LLM-drafted work order email content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

// Transcription

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeRequest {
    #[validate(length(min = 1, message = "audioB64 is required"))]
    pub audio_b64: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub transcription: String,
}

// Locations

#[derive(Debug, Deserialize)]
pub struct NearestQuery {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LocationSearchQuery {
    #[validate(length(min = 1, message = "q is required"))]
    pub q: String,
}
