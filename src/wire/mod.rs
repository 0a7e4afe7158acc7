use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// ========================================
/// Conversation
/// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageRef },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: MessageContent::Text(text.into()) }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Text(text.into()) }
    }
}

/// ========================================
/// Models
/// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub name: String,
    pub available: bool,
}

/// Sampling knobs forwarded to the inference server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    #[serde(rename = "num_predict")]
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl GenerateOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self { temperature: cfg.temperature, max_tokens: cfg.max_tokens, stop: cfg.stop.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    /// Wall-clock seconds spent draining the stream.
    pub duration: f64,
}

/// ========================================
/// Generation requests
/// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Html,
    Css,
    React,
    Enhance,
    Fix,
    Website,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Html => "html",
            GenerationKind::Css => "css",
            GenerationKind::React => "react",
            GenerationKind::Enhance => "enhance",
            GenerationKind::Fix => "fix",
            GenerationKind::Website => "website",
        }
    }

    /// Human wording used by status and error events.
    pub fn activity(&self) -> &'static str {
        match self {
            GenerationKind::Html => "Generating HTML...",
            GenerationKind::Css => "Generating CSS...",
            GenerationKind::React => "Generating React component...",
            GenerationKind::Enhance => "Enhancing code...",
            GenerationKind::Fix => "Fixing code issues...",
            GenerationKind::Website => "Creating website...",
        }
    }

    pub fn failure_label(&self) -> &'static str {
        match self {
            GenerationKind::Html => "HTML generation failed",
            GenerationKind::Css => "CSS generation failed",
            GenerationKind::React => "React generation failed",
            GenerationKind::Enhance => "Code enhancement failed",
            GenerationKind::Fix => "Code fixing failed",
            GenerationKind::Website => "Website creation failed",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(GenerationKind::Html),
            "css" => Ok(GenerationKind::Css),
            "react" => Ok(GenerationKind::React),
            "enhance" => Ok(GenerationKind::Enhance),
            "fix" => Ok(GenerationKind::Fix),
            "website" => Ok(GenerationKind::Website),
            other => Err(format!("Unknown request type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlRequest {
    pub description: String,
    pub additional_requirements: String,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CssRequest {
    pub mockup_description: String,
    pub existing_html: String,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactRequest {
    pub component_description: String,
    pub props: Vec<String>,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceRequest {
    pub existing_code: String,
    pub enhancement_request: String,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixRequest {
    pub problematic_code: String,
    pub issues_description: String,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebsiteRequest {
    pub site_description: String,
    pub pages: Vec<String>,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GenerationRequest {
    Html(HtmlRequest),
    Css(CssRequest),
    React(ReactRequest),
    Enhance(EnhanceRequest),
    Fix(FixRequest),
    Website(WebsiteRequest),
}

impl GenerationRequest {
    pub fn kind(&self) -> GenerationKind {
        match self {
            GenerationRequest::Html(_) => GenerationKind::Html,
            GenerationRequest::Css(_) => GenerationKind::Css,
            GenerationRequest::React(_) => GenerationKind::React,
            GenerationRequest::Enhance(_) => GenerationKind::Enhance,
            GenerationRequest::Fix(_) => GenerationKind::Fix,
            GenerationRequest::Website(_) => GenerationKind::Website,
        }
    }

    pub fn model_name(&self) -> Option<&str> {
        let name = match self {
            GenerationRequest::Html(r) => &r.model_name,
            GenerationRequest::Css(r) => &r.model_name,
            GenerationRequest::React(r) => &r.model_name,
            GenerationRequest::Enhance(r) => &r.model_name,
            GenerationRequest::Fix(r) => &r.model_name,
            GenerationRequest::Website(r) => &r.model_name,
        };
        name.as_deref().filter(|m| !m.trim().is_empty())
    }
}

/// ========================================
/// Stream events
/// ========================================

/// Named generated files, e.g. `html` -> markup or `style.css` -> stylesheet.
pub type Artifacts = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Status { message: String },
    Chunk { content: String },
    Complete { kind: GenerationKind, data: Artifacts },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<GenerationKind>,
        message: String,
    },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }
}

/// One outbound message frame on the streaming connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub event: StreamEvent,
}
