// handlers/mpesa_handlers.rs
use axum::{
    body::Bytes,
    extract::State,
    response::Json,
};
use chrono::Utc;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::errors::{AppError, Result};
use crate::models::payment::{Payment, PaymentStatus, StkCallback};
use crate::models::submission::{Submission, SubmissionStatus};
use crate::services::{phone::normalize_phone, refs::default_payment_ref};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StkPushPayload {
    pub phone: String,
    pub amount: Option<f64>,
    pub account: Option<String>,
}

/// Payment initiation: record the intent first, then ask Daraja for the
/// push prompt, then attach the correlation IDs to the same row.
pub async fn initiate_stk_push(
    State(state): State<AppState>,
    Json(payload): Json<StkPushPayload>,
) -> Result<Json<Value>> {
    let mpesa_service = state
        .mpesa_service
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("M-Pesa service is not available".to_string()))?;

    if payload.phone.trim().is_empty() {
        return Err(AppError::missing("phone"));
    }
    let amount = payload.amount.ok_or_else(|| AppError::missing("amount"))?;
    if amount <= 0.0 {
        return Err(AppError::ValidationError("Amount must be greater than 0".to_string()));
    }
    let phone = normalize_phone(&payload.phone).ok_or(AppError::InvalidPhone)?;

    let order_ref = payload
        .account
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .unwrap_or_else(default_payment_ref);

    // Persisted before the gateway call so a stray callback referencing this
    // initiation has a row to land on.
    let mut payment = new_pending_payment(&phone, amount, &order_ref);

    let payments: Collection<Payment> = state.db.collection("payments");
    payments.insert_one(&payment).await?;

    let stk_response = mpesa_service
        .request_stk_push(&phone, amount, &order_ref)
        .await?;

    payments
        .update_one(
            doc! { "_id": payment.id },
            doc! { "$set": {
                "mpesaMerchantRequestID": &stk_response.merchant_request_id,
                "mpesaCheckoutRequestID": &stk_response.checkout_request_id,
                "updatedAt": bson_now()?,
            }},
        )
        .await?;

    payment.mpesa_merchant_request_id = Some(stk_response.merchant_request_id.clone());
    payment.mpesa_checkout_request_id = Some(stk_response.checkout_request_id.clone());

    info!(
        "STK push initiated for {}: merchant={} checkout={}",
        order_ref, stk_response.merchant_request_id, stk_response.checkout_request_id
    );

    Ok(Json(json!({
        "success": true,
        "data": {
            "MerchantRequestID": stk_response.merchant_request_id,
            "CheckoutRequestID": stk_response.checkout_request_id,
            "ResponseCode": stk_response.response_code,
            "ResponseDescription": stk_response.response_description,
            "CustomerMessage": stk_response.customer_message,
        },
        "payment": payment,
    })))
}

/// Daraja STK callback. The gateway needs a fast 200 and retries on timeout,
/// so the acknowledgement goes out for any body, before any database work;
/// reconciliation runs in a detached task with its own error boundary.
pub async fn mpesa_stk_callback(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<Value> {
    tokio::spawn(async move {
        if let Err(e) = reconcile_callback(&state, &body).await {
            error!("Error processing STK callback: {}", e);
        }
    });

    Json(json!({ "ResultCode": 0, "ResultDesc": "Received" }))
}

async fn reconcile_callback(state: &AppState, body: &[u8]) -> Result<()> {
    let Some(cb) = StkCallback::parse(body) else {
        warn!("Unexpected STK callback body, ignoring");
        return Ok(());
    };

    let status = cb.terminal_status();
    let fields = cb.extract_fields();

    let mut set = doc! {
        "resultCode": cb.result_code,
        "resultDesc": &cb.result_desc,
        "status": status.as_str(),
        "callbackData": audit_bson(body)?,
        "updatedAt": bson_now()?,
    };
    if let Some(transaction_id) = &fields.transaction_id {
        set.insert("transactionId", transaction_id);
    }
    if let Some(amount) = fields.amount {
        set.insert("amount", amount);
    }
    if let Some(phone) = &fields.phone {
        set.insert("phone", phone);
    }
    if let Some(transaction_date) = &fields.transaction_date {
        set.insert("transactionDate", transaction_date);
    }

    let correlation = cb
        .checkout_id()
        .or_else(|| cb.merchant_id())
        .unwrap_or("unknown")
        .to_string();

    let payments: Collection<Payment> = state.db.collection("payments");
    let payment = payments
        .find_one_and_update(pending_payment_filter(&cb), doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await?;

    let Some(payment) = payment else {
        if payments.find_one(correlation_filter(&cb)).await?.is_some() {
            info!(
                "Duplicate STK callback for {} ignored; payment already terminal",
                correlation
            );
        } else {
            warn!("Payment record not found for {}", correlation);
        }
        return Ok(());
    };

    info!(
        "Payment {} reconciled to {} (ResultCode {})",
        payment.order_ref,
        status.as_str(),
        cb.result_code
    );

    cascade_to_submission(state, &payment, status).await
}

/// Propagates the payment outcome to the linked submission, if any, and
/// notifies the requester by email when an address is on file.
async fn cascade_to_submission(
    state: &AppState,
    payment: &Payment,
    status: PaymentStatus,
) -> Result<()> {
    let submissions: Collection<Submission> = state.db.collection("submissions");
    let Some(submission) = submissions
        .find_one(doc! { "orderRef": &payment.order_ref })
        .await?
    else {
        return Ok(());
    };

    let new_status = cascade_status(status, state.config.demote_on_failed_payment);

    if let (Some(new_status), Some(id)) = (new_status, submission.id) {
        submissions
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "status": new_status.as_str(), "updatedAt": bson_now()? } },
            )
            .await?;
        info!(
            "Submission {} moved to {} after payment {}",
            submission.order_ref,
            new_status.as_str(),
            status.as_str()
        );
    }

    if let (Some(email), Some(email_service)) = (&submission.email, &state.email_service) {
        let result = email_service
            .send(
                email,
                &format!("Payment {} - {}", status.as_str(), submission.order_ref),
                &format!(
                    "Hello {}, your payment status: {}. Ref: {}",
                    submission.name,
                    status.as_str(),
                    payment.transaction_id.as_deref().unwrap_or("N/A")
                ),
            )
            .await;
        if let Err(e) = result {
            warn!("Email send failed: {}", e);
        }
    }

    Ok(())
}

fn new_pending_payment(phone: &str, amount: f64, order_ref: &str) -> Payment {
    Payment {
        id: Some(mongodb::bson::oid::ObjectId::new()),
        order_ref: order_ref.to_string(),
        phone: phone.to_string(),
        amount,
        mpesa_merchant_request_id: None,
        mpesa_checkout_request_id: None,
        result_code: None,
        result_desc: None,
        transaction_id: None,
        transaction_date: None,
        status: PaymentStatus::Pending,
        callback_data: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Matches a payment to a callback on whichever correlation IDs Daraja sent.
/// An omitted or empty ID contributes no clause, so it can never match a row
/// whose stored ID is null.
fn correlation_filter(cb: &StkCallback) -> Document {
    let mut clauses = Vec::new();
    if let Some(id) = cb.checkout_id() {
        clauses.push(doc! { "mpesaCheckoutRequestID": id });
    }
    if let Some(id) = cb.merchant_id() {
        clauses.push(doc! { "mpesaMerchantRequestID": id });
    }
    doc! { "$or": clauses }
}

/// The conditional-update filter: correlation match plus a Pending guard, so
/// only a still-pending payment can transition and a duplicate callback for
/// an already-terminal row matches nothing.
fn pending_payment_filter(cb: &StkCallback) -> Document {
    let mut filter = correlation_filter(cb);
    filter.insert("status", PaymentStatus::Pending.as_str());
    filter
}

/// Which status the linked submission moves to for a given payment outcome.
/// Demoting on failure is configurable until the open product question about
/// reverting in-progress requests is settled.
fn cascade_status(status: PaymentStatus, demote_on_failure: bool) -> Option<SubmissionStatus> {
    match status {
        PaymentStatus::Success => Some(SubmissionStatus::Processing),
        PaymentStatus::Failed if demote_on_failure => Some(SubmissionStatus::Pending),
        _ => None,
    }
}

fn bson_now() -> Result<mongodb::bson::Bson> {
    to_bson(&Utc::now()).map_err(|e| AppError::ValidationError(format!("BSON error: {}", e)))
}

/// Full raw payload, stored for audit next to the extracted fields.
fn audit_bson(body: &[u8]) -> Result<mongodb::bson::Bson> {
    let value: Value = serde_json::from_slice(body)?;
    to_bson(&value).map_err(|e| AppError::ValidationError(format!("BSON error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback(merchant: Option<&str>, checkout: Option<&str>) -> StkCallback {
        StkCallback {
            merchant_request_id: merchant.map(String::from),
            checkout_request_id: checkout.map(String::from),
            result_code: 0,
            result_desc: "ok".to_string(),
            callback_metadata: None,
        }
    }

    #[test]
    fn pending_filter_guards_on_both_correlation_and_status() {
        let filter = pending_payment_filter(&callback(Some("29115-34620561-1"), Some("ws_CO_1")));

        // Dropping the Pending guard would let a second callback re-update a
        // terminal payment; this is the idempotency condition.
        assert_eq!(filter.get_str("status").unwrap(), "Pending");

        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 2);
        let checkout = clauses[0].as_document().unwrap();
        assert_eq!(checkout.get_str("mpesaCheckoutRequestID").unwrap(), "ws_CO_1");
        let merchant = clauses[1].as_document().unwrap();
        assert_eq!(merchant.get_str("mpesaMerchantRequestID").unwrap(), "29115-34620561-1");
    }

    #[test]
    fn omitted_correlation_id_contributes_no_clause() {
        let filter = correlation_filter(&callback(None, Some("ws_CO_only_checkout")));
        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(
            clauses[0].as_document().unwrap().get_str("mpesaCheckoutRequestID").unwrap(),
            "ws_CO_only_checkout"
        );

        let filter = correlation_filter(&callback(Some("29115-only-merchant"), None));
        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(
            clauses[0].as_document().unwrap().get_str("mpesaMerchantRequestID").unwrap(),
            "29115-only-merchant"
        );
    }

    #[test]
    fn empty_correlation_id_cannot_match_a_null_column() {
        let filter = correlation_filter(&callback(Some(""), Some("ws_CO_1")));
        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 1);
        assert!(clauses[0].as_document().unwrap().get_str("mpesaMerchantRequestID").is_err());
    }

    #[test]
    fn payment_starts_pending_with_no_correlation_ids() {
        let payment = new_pending_payment("254712345678", 1000.0, "FI-abc-123456");
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, 1000.0);
        assert!(payment.mpesa_merchant_request_id.is_none());
        assert!(payment.mpesa_checkout_request_id.is_none());
        assert!(payment.id.is_some());
    }

    #[test]
    fn successful_payment_moves_submission_to_processing() {
        assert_eq!(
            cascade_status(PaymentStatus::Success, true),
            Some(SubmissionStatus::Processing)
        );
        assert_eq!(
            cascade_status(PaymentStatus::Success, false),
            Some(SubmissionStatus::Processing)
        );
    }

    #[test]
    fn failed_payment_demotes_only_when_configured() {
        assert_eq!(
            cascade_status(PaymentStatus::Failed, true),
            Some(SubmissionStatus::Pending)
        );
        assert_eq!(cascade_status(PaymentStatus::Failed, false), None);
    }

    #[test]
    fn audit_bson_keeps_the_raw_payload() {
        let body = br#"{"Body":{"stkCallback":{"MerchantRequestID":"m"}}}"#;
        let bson = audit_bson(body).unwrap();
        let doc = bson.as_document().unwrap();
        assert!(doc.contains_key("Body"));
    }

    #[test]
    fn audit_bson_rejects_non_json() {
        assert!(audit_bson(b"not json").is_err());
    }
}
