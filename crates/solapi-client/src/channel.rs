use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use woodlink_core::config::MessagingConfig;
use woodlink_core::entity::Contact;
use woodlink_core::notify::{render, DispatchResult, NotificationChannel, Variables};
use woodlink_core::types::TemplateKind;

use crate::client::SolapiClient;
use crate::error::{Result, SolapiError};
use crate::types::{KakaoOptions, Message};

/// AlimTalk first, SMS second.
///
/// A kind with no template id (or a channel with no Kakao profile) skips
/// straight to SMS when fallback is allowed.
#[derive(Debug, Clone)]
pub struct SolapiChannel {
    client: SolapiClient,
    sender: String,
    pf_id: String,
    templates: BTreeMap<TemplateKind, String>,
    fallback_texts: BTreeMap<TemplateKind, String>,
}

impl SolapiChannel {
    pub fn new(client: SolapiClient, config: &MessagingConfig) -> Self {
        Self {
            client,
            sender: config.sender.clone(),
            pf_id: config.pf_id.clone(),
            templates: config.templates.clone(),
            fallback_texts: config.fallback_texts.clone(),
        }
    }

    pub fn from_config(config: &MessagingConfig) -> Result<Self> {
        if !config.is_usable() {
            return Err(SolapiError::NotConfigured(
                "API_KEY, API_SECRET and SOLAPI_PHONE are required".into(),
            ));
        }
        let client = SolapiClient::new(
            &config.base_url,
            &config.api_key,
            &config.api_secret,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self::new(client, config))
    }

    fn alimtalk(&self, to: &Contact, kind: TemplateKind, vars: &Variables) -> Result<Message> {
        let template_id = self
            .templates
            .get(&kind)
            .filter(|_| !self.pf_id.is_empty())
            .ok_or_else(|| SolapiError::NotConfigured(format!("no AlimTalk template for '{kind}'")))?;
        Ok(Message {
            to: to.phone.clone(),
            from: self.sender.clone(),
            text: None,
            kakao_options: Some(KakaoOptions {
                pf_id: self.pf_id.clone(),
                template_id: template_id.clone(),
                variables: vars
                    .iter()
                    .map(|(k, v)| (format!("#{{{k}}}"), v.clone()))
                    .collect(),
                disable_sms: true,
            }),
        })
    }

    fn sms(&self, to: &Contact, kind: TemplateKind, vars: &Variables) -> Result<Message> {
        let text = self
            .fallback_texts
            .get(&kind)
            .ok_or_else(|| SolapiError::NotConfigured(format!("no SMS text for '{kind}'")))?;
        Ok(Message {
            to: to.phone.clone(),
            from: self.sender.clone(),
            text: Some(render(text, vars)),
            kakao_options: None,
        })
    }

    async fn try_send(&self, message: Result<Message>) -> Result<()> {
        self.client.send(&message?).await.map(|_| ())
    }
}

#[async_trait]
impl NotificationChannel for SolapiChannel {
    async fn send(
        &self,
        to: &Contact,
        template: TemplateKind,
        variables: &Variables,
        allow_fallback: bool,
    ) -> DispatchResult {
        let primary = match self.try_send(self.alimtalk(to, template, variables)).await {
            Ok(()) => return DispatchResult::DeliveredPrimary,
            Err(e) => e,
        };
        if !allow_fallback {
            return DispatchResult::Failed(format!("alimtalk: {primary}"));
        }
        tracing::info!(to = %to.phone, template = %template, error = %primary, "alimtalk failed; falling back to sms");
        match self.try_send(self.sms(to, template, variables)).await {
            Ok(()) => DispatchResult::DeliveredFallback,
            Err(fallback) => {
                DispatchResult::Failed(format!("alimtalk: {primary}; sms: {fallback}"))
            }
        }
    }
}
