//! Wire types for `POST /messages/v4/send`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One outbound message. With `kakao_options` set it is sent as an AlimTalk;
/// otherwise as SMS/LMS, chosen by the provider from the text length.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub to: String,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kakao_options: Option<KakaoOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KakaoOptions {
    pub pf_id: String,
    pub template_id: String,
    /// Keys are the literal placeholders, e.g. `#{name}`.
    pub variables: BTreeMap<String, String>,
    /// Fallback is driven by the channel, never by the provider.
    pub disable_sms: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendRequest<'a> {
    pub message: &'a Message,
}

/// Accepted-message receipt. `status_code` is `"2000"` when the provider
/// queued the message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub status_message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorBody {
    pub error_code: String,
    #[serde(default)]
    pub error_message: String,
}

pub(crate) const ACCEPTED: &str = "2000";
