// handlers/admin.rs
use axum::{
    extract::{Path, State},
    response::Json,
};
use bcrypt::verify;
use chrono::Utc;
use futures_util::TryStreamExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use mongodb::bson::{doc, oid::ObjectId, to_bson};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::{AppError, Result};
use crate::models::admin_user::{AdminLogin, AdminUser, Claims};
use crate::models::submission::{Submission, SubmissionStatus, UpdateSubmission};
use crate::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLogin>,
) -> Result<Json<Value>> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::missing("email and password"));
    }

    let collection: Collection<AdminUser> = state.db.collection("admin_users");
    let admin = collection
        .find_one(doc! { "email": payload.email.to_lowercase() })
        .await?
        .ok_or(AppError::AuthError)?;

    let matches = verify(&payload.password, &admin.password_hash).map_err(|_| AppError::AuthError)?;
    if !matches {
        return Err(AppError::AuthError);
    }

    let claims = Claims {
        sub: admin.id.map(|id| id.to_hex()).unwrap_or_default(),
        email: admin.email.clone(),
        role: "admin".to_string(),
        exp: (Utc::now() + chrono::Duration::hours(state.config.jwt_expires_hours)).timestamp()
            as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt_secret.as_ref()),
    )
    .map_err(|_| AppError::AuthError)?;

    info!("Admin login: {}", admin.email);
    Ok(Json(json!({ "success": true, "token": token })))
}

/// All submissions, latest first.
pub async fn list_submissions(State(state): State<AppState>) -> Result<Json<Value>> {
    let collection: Collection<Submission> = state.db.collection("submissions");

    let cursor = collection
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .await?;
    let submissions: Vec<Submission> = cursor.try_collect().await?;

    Ok(Json(json!({
        "success": true,
        "count": submissions.len(),
        "submissions": submissions,
    })))
}

/// Updates the whitelisted fields of a submission. Moving a record to
/// Completed triggers a best-effort email to the requester.
pub async fn update_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSubmission>,
) -> Result<Json<Value>> {
    let object_id = ObjectId::parse_str(&id)?;

    let mut set = doc! { "updatedAt": to_bson(&Utc::now())
        .map_err(|e| AppError::ValidationError(format!("BSON error: {}", e)))? };
    if let Some(name) = &payload.name {
        set.insert("name", name);
    }
    if let Some(email) = &payload.email {
        set.insert("email", email);
    }
    if let Some(details) = &payload.details {
        set.insert("details", details);
    }
    if let Some(status) = payload.status {
        set.insert("status", status.as_str());
    }

    let collection: Collection<Submission> = state.db.collection("submissions");
    let submission = collection
        .find_one_and_update(doc! { "_id": object_id }, doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or(AppError::DocumentNotFound)?;

    if payload.status == Some(SubmissionStatus::Completed) {
        if let (Some(email), Some(email_service)) = (&submission.email, &state.email_service) {
            let result = email_service
                .send(
                    email,
                    &format!("Your request {} is completed", submission.order_ref),
                    &format!(
                        "Hello {},\n\nYour request ({}) has been completed.\n\nThank you,\nFixIt Online",
                        submission.name, submission.order_ref
                    ),
                )
                .await;
            if let Err(e) = result {
                warn!("Email failed: {}", e);
            }
        }
    }

    Ok(Json(json!({ "success": true, "submission": submission })))
}

pub async fn delete_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let object_id = ObjectId::parse_str(&id)?;

    let collection: Collection<Submission> = state.db.collection("submissions");
    let result = collection.delete_one(doc! { "_id": object_id }).await?;
    if result.deleted_count == 0 {
        return Err(AppError::DocumentNotFound);
    }

    Ok(Json(json!({ "success": true, "message": "Submission deleted" })))
}
