//! Notification channel contract.
//!
//! A channel substitutes template variables and delivers one message to one
//! recipient, trying its primary transport first and its secondary transport
//! when the primary fails and fallback is allowed. Delivery is best-effort:
//! failures come back as [`DispatchResult::Failed`], never as errors.

use crate::entity::Contact;
use crate::types::TemplateKind;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Template variables keyed by bare name (`name`, `date`, `LINK`, ...).
pub type Variables = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "reason", rename_all = "snake_case")]
pub enum DispatchResult {
    DeliveredPrimary,
    DeliveredFallback,
    Failed(String),
}

impl DispatchResult {
    pub fn is_delivered(&self) -> bool {
        !matches!(self, DispatchResult::Failed(_))
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(
        &self,
        to: &Contact,
        template: TemplateKind,
        variables: &Variables,
        allow_fallback: bool,
    ) -> DispatchResult;
}

/// Channel that only records messages in the log. Wired in when messaging
/// credentials are not configured.
#[derive(Debug, Default, Clone)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(
        &self,
        to: &Contact,
        template: TemplateKind,
        variables: &Variables,
        _allow_fallback: bool,
    ) -> DispatchResult {
        tracing::info!(
            to = %to.phone,
            template = %template,
            ?variables,
            "messaging disabled; notification logged only"
        );
        DispatchResult::DeliveredPrimary
    }
}

/// Replace every `#{key}` in `text` with its value.
pub fn render(text: &str, variables: &Variables) -> String {
    variables.iter().fold(text.to_string(), |acc, (k, v)| {
        acc.replace(&format!("#{{{k}}}"), v)
    })
}

/// Render a timestamp in Korea Standard Time the way messages show dates:
/// `2024년 06월 01일 오후 3시 05분`.
pub fn format_kst(ts: DateTime<Utc>) -> String {
    let kst = FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix());
    let local = ts.with_timezone(&kst);
    let (pm, hour) = local.hour12();
    let period = if pm { "오후" } else { "오전" };
    format!(
        "{} {period} {hour}시 {:02}분",
        local.format("%Y년 %m월 %d일"),
        local.minute()
    )
}
