use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, Bson};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn from_result_code(code: i64) -> Self {
        if code == 0 {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Success => "Success",
            PaymentStatus::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Links to a Submission by value only; a payment with no matching
    /// submission is a valid orphan.
    pub order_ref: String,
    pub phone: String,
    pub amount: f64,
    #[serde(rename = "mpesaMerchantRequestID")]
    pub mpesa_merchant_request_id: Option<String>,
    #[serde(rename = "mpesaCheckoutRequestID")]
    pub mpesa_checkout_request_id: Option<String>,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    pub transaction_id: Option<String>,
    pub transaction_date: Option<String>,
    pub status: PaymentStatus,
    /// Raw callback payload kept for audit.
    pub callback_data: Option<Bson>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ===== Daraja STK callback body =====

#[derive(Debug, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    // Daraja may omit either correlation ID; matching on whichever is
    // present is sufficient.
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: serde_json::Value,
}

/// Fields pulled out of `CallbackMetadata`. Items Daraja left out stay `None`
/// so the reconciler never clobbers previously stored values.
#[derive(Debug, Default, PartialEq)]
pub struct CallbackFields {
    pub transaction_id: Option<String>,
    pub amount: Option<f64>,
    pub phone: Option<String>,
    pub transaction_date: Option<String>,
}

impl StkCallback {
    /// Accepts any body carrying the nested callback structure and at least
    /// one correlation ID; anything else is malformed.
    pub fn parse(body: &[u8]) -> Option<StkCallback> {
        let cb = serde_json::from_slice::<StkCallbackEnvelope>(body)
            .ok()?
            .body
            .stk_callback;
        if cb.checkout_id().is_none() && cb.merchant_id().is_none() {
            return None;
        }
        Some(cb)
    }

    /// CheckoutRequestID when present and non-empty.
    pub fn checkout_id(&self) -> Option<&str> {
        self.checkout_request_id.as_deref().filter(|s| !s.is_empty())
    }

    /// MerchantRequestID when present and non-empty.
    pub fn merchant_id(&self) -> Option<&str> {
        self.merchant_request_id.as_deref().filter(|s| !s.is_empty())
    }

    pub fn terminal_status(&self) -> PaymentStatus {
        PaymentStatus::from_result_code(self.result_code)
    }

    /// Flattens the metadata item list into the fields the reconciler
    /// persists. Daraja spells the receipt key a few different ways across
    /// API versions, so several are accepted.
    pub fn extract_fields(&self) -> CallbackFields {
        let mut fields = CallbackFields::default();
        let Some(metadata) = &self.callback_metadata else {
            return fields;
        };

        for item in &metadata.items {
            match item.name.as_str() {
                "MpesaReceiptNumber" | "TransactionID" | "TransactionReceipt" | "ReceiptNumber" => {
                    if fields.transaction_id.is_none() {
                        fields.transaction_id = value_as_string(&item.value);
                    }
                }
                "Amount" => fields.amount = item.value.as_f64(),
                "PhoneNumber" => fields.phone = value_as_string(&item.value),
                "TransactionDate" => fields.transaction_date = value_as_string(&item.value),
                _ => {}
            }
        }
        fields
    }
}

fn value_as_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_callback(result_code: i64, with_metadata: bool) -> Vec<u8> {
        let mut stk = json!({
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": "ws_CO_191220191020363925",
            "ResultCode": result_code,
            "ResultDesc": "The service request is processed successfully.",
        });
        if with_metadata {
            stk["CallbackMetadata"] = json!({
                "Item": [
                    { "Name": "Amount", "Value": 1000.0 },
                    { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                    { "Name": "TransactionDate", "Value": 20191219102115_i64 },
                    { "Name": "PhoneNumber", "Value": 254712345678_i64 },
                ]
            });
        }
        serde_json::to_vec(&json!({ "Body": { "stkCallback": stk } })).unwrap()
    }

    #[test]
    fn parses_success_callback() {
        let cb = StkCallback::parse(&sample_callback(0, true)).unwrap();
        assert_eq!(cb.checkout_id(), Some("ws_CO_191220191020363925"));
        assert_eq!(cb.merchant_id(), Some("29115-34620561-1"));
        assert_eq!(cb.terminal_status(), PaymentStatus::Success);
    }

    #[test]
    fn callback_with_only_one_correlation_id_is_accepted() {
        let body = serde_json::to_vec(&json!({
            "Body": { "stkCallback": {
                "CheckoutRequestID": "ws_CO_only_checkout",
                "ResultCode": 0,
                "ResultDesc": "ok",
            }}
        }))
        .unwrap();
        let cb = StkCallback::parse(&body).unwrap();
        assert_eq!(cb.checkout_id(), Some("ws_CO_only_checkout"));
        assert_eq!(cb.merchant_id(), None);
        assert_eq!(cb.terminal_status(), PaymentStatus::Success);

        let body = serde_json::to_vec(&json!({
            "Body": { "stkCallback": {
                "MerchantRequestID": "29115-only-merchant",
                "ResultCode": 1,
                "ResultDesc": "cancelled",
            }}
        }))
        .unwrap();
        let cb = StkCallback::parse(&body).unwrap();
        assert_eq!(cb.merchant_id(), Some("29115-only-merchant"));
        assert_eq!(cb.checkout_id(), None);
    }

    #[test]
    fn callback_without_any_correlation_id_is_malformed() {
        let body = serde_json::to_vec(&json!({
            "Body": { "stkCallback": {
                "ResultCode": 0,
                "ResultDesc": "ok",
            }}
        }))
        .unwrap();
        assert!(StkCallback::parse(&body).is_none());
    }

    #[test]
    fn empty_correlation_ids_count_as_absent() {
        let body = serde_json::to_vec(&json!({
            "Body": { "stkCallback": {
                "MerchantRequestID": "",
                "CheckoutRequestID": "",
                "ResultCode": 0,
                "ResultDesc": "ok",
            }}
        }))
        .unwrap();
        assert!(StkCallback::parse(&body).is_none());
    }

    #[test]
    fn parses_failure_callback_without_metadata() {
        let cb = StkCallback::parse(&sample_callback(1032, false)).unwrap();
        assert_eq!(cb.terminal_status(), PaymentStatus::Failed);
        assert_eq!(cb.extract_fields(), CallbackFields::default());
    }

    #[test]
    fn rejects_malformed_body() {
        assert!(StkCallback::parse(b"not json").is_none());
        assert!(StkCallback::parse(br#"{"Body":{}}"#).is_none());
        assert!(StkCallback::parse(br#"{"unexpected":true}"#).is_none());
    }

    #[test]
    fn extracts_metadata_fields() {
        let cb = StkCallback::parse(&sample_callback(0, true)).unwrap();
        let fields = cb.extract_fields();
        assert_eq!(fields.transaction_id.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(fields.amount, Some(1000.0));
        assert_eq!(fields.phone.as_deref(), Some("254712345678"));
        assert_eq!(fields.transaction_date.as_deref(), Some("20191219102115"));
    }

    #[test]
    fn receipt_key_spellings_are_accepted() {
        let body = serde_json::to_vec(&json!({
            "Body": { "stkCallback": {
                "MerchantRequestID": "m",
                "CheckoutRequestID": "c",
                "ResultCode": 0,
                "ResultDesc": "ok",
                "CallbackMetadata": { "Item": [
                    { "Name": "TransactionReceipt", "Value": "ABC123" },
                ]},
            }}
        }))
        .unwrap();
        let cb = StkCallback::parse(&body).unwrap();
        assert_eq!(cb.extract_fields().transaction_id.as_deref(), Some("ABC123"));
    }

    #[test]
    fn result_code_maps_to_terminal_status() {
        assert_eq!(PaymentStatus::from_result_code(0), PaymentStatus::Success);
        assert_eq!(PaymentStatus::from_result_code(1), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_result_code(1032), PaymentStatus::Failed);
    }
}
