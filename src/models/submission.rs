use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Lifecycle of a service request. Two vocabularies are in use: the payment
/// flow moves requests through Pending/Processing/Completed, while the triage
/// screens historically used pending/reviewed/resolved. The enum carries both
/// sets and accepts the lowercase spellings on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "processing")]
    Processing,
    #[serde(alias = "completed")]
    Completed,
    #[serde(alias = "reviewed")]
    Reviewed,
    #[serde(alias = "resolved")]
    Resolved,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "Pending",
            SubmissionStatus::Processing => "Processing",
            SubmissionStatus::Completed => "Completed",
            SubmissionStatus::Reviewed => "Reviewed",
            SubmissionStatus::Resolved => "Resolved",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Human-readable reference shared with any payment for this request.
    /// Unique and never reused.
    pub order_ref: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub service: String,
    pub details: String,
    pub source: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubmission {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub service: Option<String>,
    pub details: String,
    pub source: Option<String>,
}

/// Admin-editable subset. Anything not listed here is immutable through the
/// admin API.
#[derive(Debug, Deserialize)]
pub struct UpdateSubmission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub details: Option<String>,
    pub status: Option<SubmissionStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_capitalized() {
        let s = serde_json::to_string(&SubmissionStatus::Processing).unwrap();
        assert_eq!(s, "\"Processing\"");
    }

    #[test]
    fn status_accepts_lowercase_triage_spellings() {
        let s: SubmissionStatus = serde_json::from_str("\"reviewed\"").unwrap();
        assert_eq!(s, SubmissionStatus::Reviewed);
        let s: SubmissionStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(s, SubmissionStatus::Pending);
    }

    #[test]
    fn status_rejects_unknown_values() {
        assert!(serde_json::from_str::<SubmissionStatus>("\"archived\"").is_err());
    }
}
