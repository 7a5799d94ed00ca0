use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub mpesa: MpesaConfig,
}

/// Daraja credentials and endpoints. Resolved once at process start;
/// nothing in the payment path reads the environment directly.
#[derive(Debug, Deserialize, Clone)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub short_code: String,
    pub pass_key: String,
    pub api_base_url: String,
    pub callback_base_url: String,
    pub callback_secret: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            mpesa: MpesaConfig {
                consumer_key: env::var("MPESA_CONSUMER_KEY")?,
                consumer_secret: env::var("MPESA_CONSUMER_SECRET")?,
                short_code: env::var("MPESA_SHORT_CODE")?,
                pass_key: env::var("MPESA_PASS_KEY")?,
                api_base_url: env::var("MPESA_API_BASE_URL")
                    .unwrap_or_else(|_| "https://sandbox.safaricom.co.ke".to_string()),
                callback_base_url: env::var("MPESA_CALLBACK_BASE_URL")?,
                callback_secret: env::var("MPESA_CALLBACK_SECRET")?,
            },
        })
    }
}

impl MpesaConfig {
    /// Full callback URL registered with the provider. The trailing
    /// secret segment is what the callback handler checks before
    /// touching the payload.
    pub fn callback_url(&self) -> String {
        format!(
            "{}/payments/callback/{}",
            self.callback_base_url.trim_end_matches('/'),
            self.callback_secret
        )
    }
}
