use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::{Result, SolapiError};
use crate::types::{ErrorBody, Message, SendReceipt, SendRequest, ACCEPTED};

type HmacSha256 = Hmac<Sha256>;

/// Thin authenticated client over the Solapi REST API.
#[derive(Debug, Clone)]
pub struct SolapiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl SolapiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        })
    }

    /// `HMAC-SHA256 apiKey=…, date=…, salt=…, signature=…` where the signature
    /// is hex(HMAC(secret, date + salt)).
    pub(crate) fn authorization(&self, date: &str, salt: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|_| SolapiError::InvalidKey)?;
        mac.update(date.as_bytes());
        mac.update(salt.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!(
            "HMAC-SHA256 apiKey={}, date={date}, salt={salt}, signature={signature}",
            self.api_key
        ))
    }

    /// Send one message. Non-2xx responses and receipts whose status code is
    /// not `2000` are errors.
    pub async fn send(&self, message: &Message) -> Result<SendReceipt> {
        let date = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let salt = Uuid::new_v4().simple().to_string();
        let auth = self.authorization(&date, &salt)?;

        let resp = self
            .http
            .post(format!("{}/messages/v4/send", self.base_url))
            .header(AUTHORIZATION, auth)
            .json(&SendRequest { message })
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ErrorBody>(&body) {
                Ok(e) => SolapiError::Rejected {
                    code: e.error_code,
                    message: e.error_message,
                },
                Err(_) => SolapiError::Status {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let receipt: SendReceipt =
            serde_json::from_str(&body).map_err(|_| SolapiError::Status {
                status: status.as_u16(),
                body: body.clone(),
            })?;
        if receipt.status_code != ACCEPTED {
            return Err(SolapiError::Rejected {
                code: receipt.status_code,
                message: receipt.status_message,
            });
        }
        tracing::debug!(message_id = %receipt.message_id, to = %message.to, "message accepted");
        Ok(receipt)
    }
}
