// ABOUTME: OpenAI-backed audio transcription and work order email drafting
// ABOUTME: Explicitly constructed client injected through AppState, no module globals

use axum::{Json, extract::State};
use base64::Engine;
use serde_json::{Value, json};
use validator::Validate;

use crate::AppState;
use crate::error::{AppError, Result};
use crate::locations::LocationDirectory;
use crate::types::{EmailContent, TranscribeRequest, TranscribeResponse};

const CHAT_MODEL: &str = "gpt-4o-mini";
const TRANSCRIPTION_MODEL: &str = "whisper-1";
const NO_LOCATION: &str = "No location mentioned";

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    /// Transcribe base64 audio (raw or data-URL) with Whisper.
    pub async fn transcribe(&self, audio_b64: &str) -> Result<String> {
        let raw = audio_b64.rsplit(',').next().unwrap_or(audio_b64);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(raw.trim())
            .map_err(|e| AppError::BadRequest(format!("invalid base64 audio: {}", e)))?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("audio.mp3")
            .mime_str("audio/mp3")?;
        let form = reqwest::multipart::Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .text("response_format", "text")
            .part("file", part);

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "transcription request failed with {}: {}",
                status, body
            )));
        }

        Ok(response.text().await?.trim().to_string())
    }

    /// Run a chat completion and return the first choice's content.
    pub async fn chat(&self, messages: Value, max_tokens: u32) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": CHAT_MODEL,
                "messages": messages,
                "max_tokens": max_tokens,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "chat completion failed with {}: {}",
                status, body
            )));
        }

        let body: Value = response.json().await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                AppError::Upstream("chat completion response had no content".to_string())
            })?;
        Ok(content.trim().to_string())
    }
}

/// Generate a work order email from an audio recording describing the issue
/// and/or a photo of it. At least one of the two must be provided.
pub async fn generate_workorder_email(
    openai: &OpenAiClient,
    locations: &LocationDirectory,
    image_b64: Option<&str>,
    audio_b64: Option<&str>,
    from_name: &str,
) -> Result<EmailContent> {
    if image_b64.is_none() && audio_b64.is_none() {
        return Err(AppError::BadRequest(
            "At least one of image or audio must be provided".to_string(),
        ));
    }

    let transcription = match audio_b64 {
        Some(audio) => openai.transcribe(audio).await?,
        None => String::new(),
    };

    let mut location_info = String::new();
    if !transcription.is_empty() {
        let reference = openai
            .chat(
                json!([
                    {
                        "role": "system",
                        "content": format!(
                            "You are an assistant that extracts location references from text. \
                             Extract any building name, room number, or location mentioned in \
                             the text. Return ONLY the location reference, nothing else. If no \
                             location is mentioned, return '{}'.",
                            NO_LOCATION
                        ),
                    },
                    { "role": "user", "content": transcription },
                ]),
                50,
            )
            .await?;

        if reference != NO_LOCATION {
            if let Some(location) = locations.search(&reference, openai).await? {
                location_info = location.display_address();
            }
        }
    }

    let mut user_content = vec![json!({
        "type": "text",
        "text": format!(
            "Draft the work order email.\nReported by: {}\nIssue description (transcribed): {}\nMatched facility location: {}",
            from_name,
            if transcription.is_empty() { "(none, see photo)" } else { &transcription },
            if location_info.is_empty() { "(unknown)" } else { &location_info },
        ),
    })];
    if let Some(image) = image_b64 {
        let url = if image.starts_with("data:") {
            image.to_string()
        } else {
            format!("data:image/jpeg;base64,{}", image)
        };
        user_content.push(json!({
            "type": "image_url",
            "image_url": { "url": url },
        }));
    }

    let draft = openai
        .chat(
            json!([
                {
                    "role": "system",
                    "content": "You write concise facility-maintenance work order emails on \
                                behalf of the person reporting the issue. Describe the problem, \
                                its location if known, and sign off with the reporter's name. \
                                Respond with a JSON object with exactly two string fields: \
                                \"subject\" and \"body\".",
                },
                { "role": "user", "content": user_content },
            ]),
            600,
        )
        .await?;

    parse_email_draft(&draft)
}

/// Parse the model's reply into subject and body, tolerating code fences.
fn parse_email_draft(draft: &str) -> Result<EmailContent> {
    let trimmed = draft
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let parsed: Value = serde_json::from_str(trimmed)
        .map_err(|e| AppError::Upstream(format!("unparseable email draft: {}", e)))?;

    let subject = parsed["subject"]
        .as_str()
        .ok_or_else(|| AppError::Upstream("email draft missing subject".to_string()))?;
    let body = parsed["body"]
        .as_str()
        .ok_or_else(|| AppError::Upstream("email draft missing body".to_string()))?;

    Ok(EmailContent {
        subject: subject.to_string(),
        body: body.to_string(),
    })
}

pub async fn transcribe(
    State(state): State<AppState>,
    Json(payload): Json<TranscribeRequest>,
) -> Result<Json<TranscribeResponse>> {
    payload.validate()?;

    let transcription = state.openai.transcribe(&payload.audio_b64).await?;
    Ok(Json(TranscribeResponse { transcription }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_draft_plain_json() {
        let draft = r#"{"subject": "Broken light", "body": "The light is out."}"#;
        let email = parse_email_draft(draft).unwrap();
        assert_eq!(email.subject, "Broken light");
        assert_eq!(email.body, "The light is out.");
    }

    #[test]
    fn test_parse_email_draft_with_code_fence() {
        let draft = "```json\n{\"subject\": \"Leak\", \"body\": \"Pipe leaking.\"}\n```";
        let email = parse_email_draft(draft).unwrap();
        assert_eq!(email.subject, "Leak");
    }

    #[test]
    fn test_parse_email_draft_rejects_garbage() {
        assert!(parse_email_draft("not json at all").is_err());
        assert!(parse_email_draft(r#"{"subject": "x"}"#).is_err());
    }
}
