use crate::error::Result;
use crate::types::TemplateKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ConfigWarning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigWarning {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Base URLs for the deep links embedded in messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Links {
    /// Where the accept/cancel endpoints are reachable from a phone.
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    /// Customer-facing web app (address change, review form).
    #[serde(default = "default_web_base")]
    pub web_base_url: String,
}

fn default_api_base() -> String {
    "http://localhost:8001".to_string()
}

fn default_web_base() -> String {
    "https://woodlink.netlify.app".to_string()
}

impl Default for Links {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base(),
            web_base_url: default_web_base(),
        }
    }
}

impl Links {
    fn api(&self, path: &str) -> String {
        format!("{}/{path}", self.api_base_url.trim_end_matches('/'))
    }

    fn web(&self, path: &str) -> String {
        format!("{}/{path}", self.web_base_url.trim_end_matches('/'))
    }

    pub fn accept(&self, claim: Uuid) -> String {
        self.api(&format!("claims/accept/{claim}"))
    }

    pub fn cancel(&self, claim: Uuid) -> String {
        self.api(&format!("claims/cancel/{claim}"))
    }

    pub fn change_address(&self, claim: Uuid) -> String {
        self.web(&format!("Delivery/{claim}"))
    }

    pub fn review(&self, claim: Uuid) -> String {
        self.web(&format!("reviewForm/{claim}"))
    }

    pub fn home(&self) -> String {
        self.web_base_url.clone()
    }
}

// ---------------------------------------------------------------------------
// MessagingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    /// Registered sender number, also used for SMS fallback.
    #[serde(default)]
    pub sender: String,
    /// Kakao channel profile id.
    #[serde(default)]
    pub pf_id: String,
    #[serde(default = "default_messaging_base")]
    pub base_url: String,
    #[serde(default = "default_messaging_timeout")]
    pub timeout_secs: u64,
    /// Provider template id per message kind.
    #[serde(default)]
    pub templates: BTreeMap<TemplateKind, String>,
    /// SMS body per message kind, with `#{var}` placeholders.
    #[serde(default = "default_fallback_texts")]
    pub fallback_texts: BTreeMap<TemplateKind, String>,
}

fn default_true() -> bool {
    true
}

fn default_messaging_base() -> String {
    "https://api.solapi.com".to_string()
}

fn default_messaging_timeout() -> u64 {
    10
}

fn default_fallback_texts() -> BTreeMap<TemplateKind, String> {
    [
        (
            TemplateKind::ClaimSubmitted,
            "[우드링크] #{name}님, #{workshop}의 #{product}(#{price}) 나눔 신청이 접수되었습니다. 신청일: #{date}\n취소: #{LINK}\n배송지 변경: #{LINK2}",
        ),
        (
            TemplateKind::ActionNeeded,
            "[우드링크] #{workshop}님, #{name}(#{phone})님이 #{product}(#{price}) 나눔을 신청했습니다. 신청일: #{date}\n접수하기: #{LINK}",
        ),
        (
            TemplateKind::ClaimAccepted,
            "[우드링크] #{name}님, #{workshop}에서 #{product}(#{price}) 신청을 접수했습니다. 신청일: #{date}\n취소: #{LINK}\n배송지 변경: #{LINK2}",
        ),
        (
            TemplateKind::ReadyForDelivery,
            "[우드링크] #{name}님, #{product} 배송이 준비되었습니다.\n우드링크: #{LINK}\n후기 작성: #{LINK2}",
        ),
        (
            TemplateKind::DeliveryChanged,
            "[우드링크] #{workshop}님, #{name}(#{phone})님의 #{product}(#{price}) 배송지가 변경되었습니다: #{address}",
        ),
        (
            TemplateKind::ClaimCancelled,
            "[우드링크] #{initiate} 요청으로 #{product}(#{price}) 나눔 신청이 취소되었습니다. 신청일: #{date}",
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k, v.to_string()))
    .collect()
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            api_key: String::new(),
            api_secret: String::new(),
            sender: String::new(),
            pf_id: String::new(),
            base_url: default_messaging_base(),
            timeout_secs: default_messaging_timeout(),
            templates: BTreeMap::new(),
            fallback_texts: default_fallback_texts(),
        }
    }
}

impl MessagingConfig {
    /// Whether a real provider can be used: enabled and credentials present.
    pub fn is_usable(&self) -> bool {
        self.enabled
            && !self.api_key.is_empty()
            && !self.api_secret.is_empty()
            && !self.sender.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default)]
    pub links: Links,
    /// Upper bound on a single notification send, enforced by the coordinator.
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub reconcile_on_start: bool,
    #[serde(default)]
    pub messaging: MessagingConfig,
}

fn default_port() -> u16 {
    8001
}

fn default_db_path() -> PathBuf {
    PathBuf::from("woodlink.redb")
}

fn default_dispatch_timeout() -> u64 {
    15
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            db_path: default_db_path(),
            links: Links::default(),
            dispatch_timeout_secs: default_dispatch_timeout(),
            reconcile_on_start: default_true(),
            messaging: MessagingConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path` if given and present, otherwise defaults; then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let data = std::fs::read_to_string(p)?;
                serde_yaml::from_str(&data)?
            }
            _ => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from environment variables. `lookup` is injected so
    /// tests do not touch the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(db) = get("WOODLINK_DB") {
            self.db_path = PathBuf::from(db);
        }
        if let Some(url) = get("WOODLINK_API_URL") {
            self.links.api_base_url = url;
        }
        if let Some(url) = get("WOODLINK_WEB_URL") {
            self.links.web_base_url = url;
        }
        if let Some(v) = get("API_KEY") {
            self.messaging.api_key = v;
        }
        if let Some(v) = get("API_SECRET") {
            self.messaging.api_secret = v;
        }
        if let Some(v) = get("SOLAPI_PHONE") {
            self.messaging.sender = v;
        }
        if let Some(v) = get("SOLAPI_PFID") {
            self.messaging.pf_id = v;
        }
        for &kind in TemplateKind::all() {
            if let Some(id) = get(kind.env_key()) {
                self.messaging.templates.insert(kind, id);
            }
        }
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let m = &self.messaging;
        if !m.enabled {
            return warnings;
        }
        if !m.is_usable() {
            warnings.push(ConfigWarning {
                message: "messaging enabled but API_KEY, API_SECRET or SOLAPI_PHONE is missing; notifications will only be logged".to_string(),
            });
            return warnings;
        }
        if m.pf_id.is_empty() {
            warnings.push(ConfigWarning {
                message: "SOLAPI_PFID is not set; every message will go out as SMS".to_string(),
            });
        }
        for &kind in TemplateKind::all() {
            if !m.templates.contains_key(&kind) {
                warnings.push(ConfigWarning {
                    message: format!(
                        "no template id for '{kind}' ({}); that message will go out as SMS",
                        kind.env_key()
                    ),
                });
            }
        }
        warnings
    }
}
