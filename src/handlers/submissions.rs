// handlers/submissions.rs
use axum::{extract::State, response::Json};
use chrono::Utc;
use mongodb::Collection;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::{AppError, Result};
use crate::models::submission::{CreateSubmission, Submission, SubmissionStatus};
use crate::services::{phone::normalize_phone, refs::generate_order_ref};
use crate::state::AppState;

/// Public intake: validate, normalize the phone, assign an order reference
/// and persist with status Pending.
pub async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<CreateSubmission>,
) -> Result<Json<Value>> {
    let name = payload.name.trim();
    let details = payload.details.trim();
    if name.is_empty() {
        return Err(AppError::missing("name"));
    }
    if payload.phone.trim().is_empty() {
        return Err(AppError::missing("phone"));
    }
    if details.is_empty() {
        return Err(AppError::missing("details"));
    }

    let normalized_phone = normalize_phone(&payload.phone).ok_or(AppError::InvalidPhone)?;

    let submission = Submission {
        id: None,
        order_ref: generate_order_ref(),
        name: name.to_string(),
        phone: normalized_phone,
        email: payload
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(String::from),
        service: payload.service.unwrap_or_else(|| "Other".to_string()),
        details: details.to_string(),
        source: payload.source.unwrap_or_else(|| "landing-page".to_string()),
        status: SubmissionStatus::Pending,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let collection: Collection<Submission> = state.db.collection("submissions");
    collection.insert_one(&submission).await?;

    info!("New submission {} from {}", submission.order_ref, submission.phone);

    // Best-effort heads-up to the admin inbox.
    if let Some(email_service) = &state.email_service {
        let result = email_service
            .send(
                email_service.notify_address(),
                &format!("New submission: {}", submission.order_ref),
                &format!(
                    "New submission from {} ({}) - {}",
                    submission.name, submission.phone, submission.details
                ),
            )
            .await;
        if let Err(e) = result {
            warn!("Email send failed: {}", e);
        }
    }

    Ok(Json(json!({ "success": true, "data": submission })))
}
