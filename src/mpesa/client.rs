use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{Config as FailsafeConfig, Error as FailsafeError, StateMachine, backoff, failure_policy};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::MpesaConfig;
use crate::error::AppError;
use crate::phone;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ACCOUNT_REFERENCE_MAX_LEN: usize = 12;
const TRANSACTION_DESC_MAX_LEN: usize = 13;

#[derive(Error, Debug)]
pub enum MpesaError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway returned HTTP {0}")]
    Http(u16),
    #[error("no access token in gateway response")]
    AuthFailed,
    #[error("push rejected (code {code}): {message}")]
    Rejected { code: String, message: String },
    #[error("invalid response from gateway: {0}")]
    InvalidResponse(String),
    #[error("gateway circuit breaker is open")]
    CircuitOpen,
}

impl From<MpesaError> for AppError {
    fn from(err: MpesaError) -> Self {
        match err {
            MpesaError::Request(e) if e.is_timeout() => AppError::GatewayTimeout,
            MpesaError::Request(e) => AppError::GatewayUnavailable(e.to_string()),
            MpesaError::Http(status) => AppError::GatewayUnavailable(format!("HTTP {status}")),
            MpesaError::AuthFailed => AppError::GatewayAuthFailed,
            MpesaError::Rejected { code, message } => AppError::GatewayRejected { code, message },
            MpesaError::InvalidResponse(detail) => AppError::GatewayUnavailable(detail),
            MpesaError::CircuitOpen => {
                AppError::GatewayUnavailable("circuit breaker open".to_string())
            }
        }
    }
}

/// The provider's response codes, mapped to user-facing messages.
/// Unrecognized codes fall through to a generic failure message.
pub fn rejection_message(code: &str) -> &'static str {
    match code {
        "1" => "Insufficient M-Pesa balance",
        "1001" => "Another M-Pesa transaction is in progress. Please wait and try again.",
        "1032" => "Payment request was cancelled",
        "1037" => "Payment request timed out. Please check your phone and try again.",
        "2001" => "Wrong M-Pesa PIN entered",
        _ => "Payment request failed. Please try again.",
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    business_short_code: String,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "TransactionType")]
    transaction_type: &'static str,
    #[serde(rename = "Amount")]
    amount: i64,
    #[serde(rename = "PartyA")]
    party_a: String,
    #[serde(rename = "PartyB")]
    party_b: String,
    #[serde(rename = "PhoneNumber")]
    phone_number: String,
    #[serde(rename = "CallBackURL")]
    callback_url: String,
    #[serde(rename = "AccountReference")]
    account_reference: String,
    #[serde(rename = "TransactionDesc")]
    transaction_desc: String,
}

#[derive(Debug, Deserialize)]
struct StkPushResponse {
    #[serde(rename = "ResponseCode")]
    response_code: Option<String>,
    #[serde(rename = "ResponseDescription")]
    response_description: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: Option<String>,
    #[serde(rename = "CustomerMessage")]
    customer_message: Option<String>,
}

/// Accepted push request: the two correlation identifiers the provider
/// will echo back in its callback.
#[derive(Debug, Clone)]
pub struct StkPushAcceptance {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub customer_message: String,
}

/// HTTP client for the Daraja STK-push API. Stateless: the bearer token
/// is fetched per request and never cached across requests.
#[derive(Clone)]
pub struct DarajaClient {
    client: Client,
    config: MpesaConfig,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl DarajaClient {
    pub fn new(config: MpesaConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = FailsafeConfig::new().failure_policy(policy).build();

        DarajaClient {
            client,
            config,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    /// Client-credentials token exchange. Fetched fresh for every push;
    /// the token's lifetime only needs to cover the one request.
    async fn access_token(&self) -> Result<String, MpesaError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.api_base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MpesaError::AuthFailed);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|_| MpesaError::AuthFailed)?;

        match token.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(MpesaError::AuthFailed),
        }
    }

    /// Submit an STK push prompting `phone` to authorize a payment of
    /// `amount` (whole shillings). Returns the provider's correlation
    /// identifiers on acceptance.
    pub async fn stk_push(
        &self,
        phone: &str,
        amount: i64,
        account_reference: &str,
        transaction_desc: &str,
    ) -> Result<StkPushAcceptance, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidFormat(
                "Amount must be a positive whole number".into(),
            ));
        }
        let msisdn = phone::to_msisdn(phone)?;

        let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
        let request = StkPushRequest {
            business_short_code: self.config.short_code.clone(),
            password: derive_password(&self.config.short_code, &self.config.pass_key, &timestamp),
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount,
            party_a: msisdn.clone(),
            party_b: self.config.short_code.clone(),
            phone_number: msisdn,
            callback_url: self.config.callback_url(),
            account_reference: truncate(account_reference, ACCOUNT_REFERENCE_MAX_LEN),
            transaction_desc: truncate(transaction_desc, TRANSACTION_DESC_MAX_LEN),
        };

        let response = self.submit(&request).await?;

        match response.response_code.as_deref() {
            Some("0") => Ok(StkPushAcceptance {
                checkout_request_id: response.checkout_request_id.ok_or_else(|| {
                    MpesaError::InvalidResponse("accepted push missing CheckoutRequestID".into())
                })?,
                merchant_request_id: response.merchant_request_id.ok_or_else(|| {
                    MpesaError::InvalidResponse("accepted push missing MerchantRequestID".into())
                })?,
                customer_message: response
                    .customer_message
                    .unwrap_or_else(|| "Check your phone to complete payment".to_string()),
            }),
            Some(code) => {
                tracing::warn!(
                    code = %code,
                    description = response.response_description.as_deref().unwrap_or(""),
                    "STK push rejected by gateway"
                );
                Err(MpesaError::Rejected {
                    code: code.to_string(),
                    message: rejection_message(code).to_string(),
                }
                .into())
            }
            None => Err(MpesaError::InvalidResponse(
                "gateway response missing ResponseCode".into(),
            )
            .into()),
        }
    }

    /// Token exchange + push submission behind the circuit breaker.
    /// Only transport failures count against the breaker; business
    /// rejections come back as parsed responses.
    async fn submit(&self, request: &StkPushRequest) -> Result<StkPushResponse, MpesaError> {
        let url = format!(
            "{}/mpesa/stkpush/v1/processrequest",
            self.config.api_base_url.trim_end_matches('/')
        );
        let client = self.client.clone();

        let result = self
            .circuit_breaker
            .call(async {
                let token = self.access_token().await?;

                let response = client
                    .post(&url)
                    .bearer_auth(token)
                    .json(request)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(MpesaError::Http(status.as_u16()));
                }

                response
                    .json::<StkPushResponse>()
                    .await
                    .map_err(|e| MpesaError::InvalidResponse(e.to_string()))
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(FailsafeError::Rejected) => Err(MpesaError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

/// Daraja request signature: base64 over short code, pass key and the
/// `YYYYMMDDHHMMSS` timestamp, in that order.
pub fn derive_password(short_code: &str, pass_key: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{short_code}{pass_key}{timestamp}"))
}

fn truncate(value: &str, max_len: usize) -> String {
    value.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> MpesaConfig {
        MpesaConfig {
            consumer_key: "key".into(),
            consumer_secret: "secret".into(),
            short_code: "174379".into(),
            pass_key: "passkey".into(),
            api_base_url: "https://sandbox.safaricom.co.ke".into(),
            callback_base_url: "https://example.com".into(),
            callback_secret: "cb".into(),
        }
    }

    #[test]
    fn test_password_derivation() {
        let password = derive_password("174379", "passkey", "20240115093000");
        assert_eq!(password, BASE64.encode("174379passkey20240115093000"));

        let decoded = BASE64.decode(password).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            "174379passkey20240115093000"
        );
    }

    #[test]
    fn test_reference_and_desc_truncation() {
        assert_eq!(truncate("TAJIRI-PREMIUM-2024", 12), "TAJIRI-PREMI");
        assert_eq!(truncate("Premium Membership", 13), "Premium Membe");
        assert_eq!(truncate("short", 12), "short");
    }

    #[test]
    fn test_rejection_message_table() {
        assert_eq!(rejection_message("1"), "Insufficient M-Pesa balance");
        assert_eq!(rejection_message("1032"), "Payment request was cancelled");
        assert_eq!(rejection_message("2001"), "Wrong M-Pesa PIN entered");
        assert_eq!(
            rejection_message("9999"),
            "Payment request failed. Please try again."
        );
    }

    #[test]
    fn test_client_creation() {
        let client = DarajaClient::new(sample_config());
        assert_eq!(client.circuit_state(), "closed");
    }

    #[tokio::test]
    async fn test_non_positive_amount_fails_before_any_io() {
        let client = DarajaClient::new(sample_config());
        for amount in [0, -5] {
            let result = client.stk_push("0712345678", amount, "ref", "desc").await;
            assert!(matches!(result, Err(AppError::InvalidFormat(_))));
        }
    }

    #[tokio::test]
    async fn test_bad_phone_fails_before_any_io() {
        let client = DarajaClient::new(sample_config());
        let result = client.stk_push("12345", 79, "ref", "desc").await;
        assert!(matches!(result, Err(AppError::InvalidFormat(_))));
    }

    #[test]
    fn test_timeout_maps_to_distinct_kind() {
        // Rejected and auth failures keep their own kinds through the
        // AppError conversion
        let err: AppError = MpesaError::AuthFailed.into();
        assert!(matches!(err, AppError::GatewayAuthFailed));

        let err: AppError = MpesaError::Rejected {
            code: "1".into(),
            message: "Insufficient M-Pesa balance".into(),
        }
        .into();
        assert!(matches!(err, AppError::GatewayRejected { .. }));

        let err: AppError = MpesaError::Http(503).into();
        assert!(matches!(err, AppError::GatewayUnavailable(_)));
    }
}
