// services/mpesa_service.rs
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::{DateTime, Duration, Local, Utc};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration as StdDuration;
use tracing::{error, info};

use crate::config::MpesaConfig;
use crate::errors::{AppError, Result};

/// Tokens are replaced once less than this much lifetime remains, so a call
/// never goes out with a credential about to lapse mid-flight.
const TOKEN_SAFETY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    // Daraja returns this as a string, e.g. "3599".
    pub expires_in: String,
}

#[derive(Debug, Serialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: f64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

#[derive(Debug, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode", default)]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

/// Owned, lock-guarded token cache. Readers during a refresh race may each
/// fetch a fresh token; the gateway tolerates the redundant auth calls, so
/// no exclusion across the refresh itself.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    inner: Arc<RwLock<Option<(String, DateTime<Utc>)>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token if more than the safety margin remains
    /// before its expiry.
    pub fn get(&self, now: DateTime<Utc>) -> Option<String> {
        let cached = self.inner.read().unwrap();
        cached.as_ref().and_then(|(token, expiry)| {
            if *expiry > now + Duration::seconds(TOKEN_SAFETY_MARGIN_SECS) {
                Some(token.clone())
            } else {
                None
            }
        })
    }

    pub fn store(&self, token: String, ttl_secs: i64, now: DateTime<Utc>) {
        let mut cached = self.inner.write().unwrap();
        *cached = Some((token, now + Duration::seconds(ttl_secs)));
    }
}

#[derive(Debug, Clone)]
pub struct MpesaService {
    config: MpesaConfig,
    client: Client,
    token_cache: TokenCache,
}

impl MpesaService {
    pub fn new(config: MpesaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()
            .map_err(|e| AppError::configuration(format!("HTTP client: {}", e)))?;

        Ok(MpesaService {
            config,
            client,
            token_cache: TokenCache::new(),
        })
    }

    /// Local time in Daraja's YYYYMMDDHHmmss format.
    fn timestamp() -> String {
        Local::now().format("%Y%m%d%H%M%S").to_string()
    }

    /// base64(shortcode + passkey + timestamp), the STK push password.
    fn password(&self, timestamp: &str) -> String {
        base64.encode(format!(
            "{}{}{}",
            self.config.short_code, self.config.passkey, timestamp
        ))
    }

    /// Bearer token for gateway calls, cached until close to expiry. No
    /// retry; an auth failure surfaces to the initiation caller.
    pub async fn get_access_token(&self) -> Result<String> {
        if let Some(token) = self.token_cache.get(Utc::now()) {
            return Ok(token);
        }

        info!("Requesting new M-Pesa access token");
        let credentials = base64.encode(format!(
            "{}:{}",
            self.config.consumer_key, self.config.consumer_secret
        ));

        let response = self
            .client
            .get(self.config.auth_url())
            .header(header::AUTHORIZATION, format!("Basic {}", credentials))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("M-Pesa auth failed: {} - {}", status, body);
            return Err(AppError::mpesa(format!("auth failed: {}", status)));
        }

        let auth: AuthResponse = response.json().await?;
        let ttl_secs = auth.expires_in.parse::<i64>().unwrap_or(3600);
        self.token_cache
            .store(auth.access_token.clone(), ttl_secs, Utc::now());

        Ok(auth.access_token)
    }

    /// Requests a push-payment prompt for an already-normalized phone
    /// number. Exactly one outbound gateway call per invocation.
    pub async fn request_stk_push(
        &self,
        phone: &str,
        amount: f64,
        account_reference: &str,
    ) -> Result<StkPushResponse> {
        info!("STK push for {} - KSh {}", phone, amount);

        let access_token = self.get_access_token().await?;
        let timestamp = Self::timestamp();
        let password = self.password(&timestamp);

        let request = StkPushRequest {
            business_short_code: self.config.short_code.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount,
            party_a: phone.to_string(),
            party_b: self.config.short_code.clone(),
            phone_number: phone.to_string(),
            callback_url: self.config.callback_url.clone(),
            account_reference: account_reference.to_string(),
            transaction_desc: format!("Payment for {}", account_reference),
        };

        let response = self
            .client
            .post(self.config.stk_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("STK push failed: {} - {}", status, body);
            return Err(AppError::mpesa(format!("STK push failed: {}", status)));
        }

        let stk_response: StkPushResponse = response.json().await?;
        info!("STK push accepted: {}", stk_response.merchant_request_id);
        Ok(stk_response)
    }
}
