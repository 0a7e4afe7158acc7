use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::errors::{GenError, Result};
use crate::extract::{self, ArtifactSpec, ParsedArtifacts};
use crate::provider::DynProvider;
use crate::wire::{
    Artifacts, CssRequest, EnhanceRequest, FixRequest, GenerateOptions, GenerationKind, GenerationRequest,
    HtmlRequest, ReactRequest, WebsiteRequest,
};
use crate::{log, prompt, safety};

pub const MOCK_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Mock Page</title>
  <link rel="stylesheet" href="style.css">
</head>
<body>
  <header><h1>Mock Page</h1></header>
  <main><p>This page was produced without contacting a model.</p></main>
</body>
</html>"#;

pub const MOCK_CSS: &str = r#"body {
  margin: 0;
  font-family: system-ui, sans-serif;
  color: #222;
  background: #fafafa;
}"#;

/// Result of one orchestrated generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub kind: GenerationKind,
    pub model: String,
    pub artifacts: Artifacts,
    pub degraded: bool,
}

impl Generation {
    /// Content of a single-artifact kind.
    pub fn code(&self) -> String {
        self.artifacts.get(primary_key(self.kind)).cloned().unwrap_or_default()
    }
}

fn primary_key(kind: GenerationKind) -> &'static str {
    match kind {
        GenerationKind::Html => "html",
        GenerationKind::Css => "css",
        GenerationKind::React => "react",
        GenerationKind::Enhance => "enhanced_code",
        GenerationKind::Fix => "fixed_code",
        GenerationKind::Website => "index.html",
    }
}

fn artifact_specs(kind: GenerationKind) -> &'static [ArtifactSpec] {
    const HTML: &[ArtifactSpec] = &[ArtifactSpec::HTML, ArtifactSpec::CSS];
    const CSS: &[ArtifactSpec] = &[ArtifactSpec::CSS];
    const REACT: &[ArtifactSpec] = &[ArtifactSpec::REACT];
    const ENHANCE: &[ArtifactSpec] = &[ArtifactSpec::code("enhanced_code")];
    const FIX: &[ArtifactSpec] = &[ArtifactSpec::code("fixed_code")];
    match kind {
        GenerationKind::Html => HTML,
        GenerationKind::Css => CSS,
        GenerationKind::React => REACT,
        GenerationKind::Enhance => ENHANCE,
        GenerationKind::Fix => FIX,
        GenerationKind::Website => &[],
    }
}

/// Prompt -> inference -> parse, one request at a time.
#[derive(Clone)]
pub struct Generator {
    config: Arc<Config>,
    provider: DynProvider,
}

impl Generator {
    pub fn new(config: Arc<Config>, provider: DynProvider) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Requested model or the configured default, checked against the allow-list.
    pub fn resolve_model(&self, requested: Option<&str>) -> Result<String> {
        let model = requested.unwrap_or(&self.config.default_model).trim();
        if !safety::model_is_allowed(model, &self.config.required_models) {
            return Err(GenError::model_not_allowed(model, &self.config.required_models));
        }
        Ok(model.to_string())
    }

    pub async fn generate_html(&self, req: HtmlRequest) -> Result<Artifacts> {
        Ok(self.run(&GenerationRequest::Html(req), None).await?.artifacts)
    }

    pub async fn generate_css(&self, req: CssRequest) -> Result<String> {
        Ok(self.run(&GenerationRequest::Css(req), None).await?.code())
    }

    pub async fn generate_react(&self, req: ReactRequest) -> Result<String> {
        Ok(self.run(&GenerationRequest::React(req), None).await?.code())
    }

    pub async fn enhance(&self, req: EnhanceRequest) -> Result<String> {
        Ok(self.run(&GenerationRequest::Enhance(req), None).await?.code())
    }

    pub async fn fix(&self, req: FixRequest) -> Result<String> {
        Ok(self.run(&GenerationRequest::Fix(req), None).await?.code())
    }

    pub async fn create_website(&self, req: WebsiteRequest) -> Result<Artifacts> {
        Ok(self.run(&GenerationRequest::Website(req), None).await?.artifacts)
    }

    /// Run one request. Each increment is forwarded to `chunks` when given;
    /// a closed chunk channel cancels the generation.
    pub async fn run(
        &self,
        req: &GenerationRequest,
        chunks: Option<&mpsc::Sender<String>>,
    ) -> Result<Generation> {
        let kind = req.kind();
        let model = self.resolve_model(req.model_name())?;
        validate_input(req)?;

        if self.config.mock {
            tracing::debug!(%kind, "mock mode, returning canned artifacts");
            return Ok(Generation { kind, model, artifacts: mock_artifacts(kind), degraded: false });
        }

        self.provider.initialize().await?;

        let built = prompt::build(req);
        let user = prompt::adapt_for_model(&built.user, &model);
        let messages = prompt::Prompt { system: built.system, user }.messages();
        let options = GenerateOptions::from_config(&self.config);

        let started = Instant::now();
        let mut stream = self.provider.generate_stream(&messages, &model, &options).await?;
        let mut raw = String::new();
        while let Some(token) = stream.next().await {
            let token = token?;
            raw.push_str(&token);
            if let Some(tx) = chunks {
                if tx.send(token).await.is_err() {
                    return Err(GenError::Cancelled);
                }
            }
        }
        log::completion_summary(kind.as_str(), &model, raw.len(), started.elapsed().as_secs_f64());

        let parsed = parse_for(kind, &raw);
        if parsed.degraded {
            tracing::warn!(%kind, model = %model, "model ignored the fence convention, using fallback parse");
        }
        Ok(Generation { kind, model, artifacts: parsed.artifacts, degraded: parsed.degraded })
    }

    /// Single non-streaming call on a caller-supplied prompt.
    pub async fn generate_raw(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        let model = self.resolve_model(model)?;
        if prompt.trim().is_empty() {
            return Err(GenError::InvalidRequest("prompt must not be empty".into()));
        }
        if self.config.mock {
            return Ok(MOCK_HTML.to_string());
        }
        self.provider.initialize().await?;
        let options = GenerateOptions::from_config(&self.config);
        self.provider.generate_once(prompt, &model, &options).await
    }
}

pub fn parse_for(kind: GenerationKind, raw: &str) -> ParsedArtifacts {
    match kind {
        GenerationKind::Website => extract::parse_site(raw),
        other => extract::parse(raw, artifact_specs(other)),
    }
}

fn mock_artifacts(kind: GenerationKind) -> Artifacts {
    let pairs: &[(&str, &str)] = match kind {
        GenerationKind::Html => &[("html", MOCK_HTML), ("css", MOCK_CSS)],
        GenerationKind::Website => &[("index.html", MOCK_HTML), ("style.css", MOCK_CSS)],
        GenerationKind::Css => &[("css", MOCK_CSS)],
        GenerationKind::React => &[("react", MOCK_HTML)],
        GenerationKind::Enhance => &[("enhanced_code", MOCK_HTML)],
        GenerationKind::Fix => &[("fixed_code", MOCK_HTML)],
    };
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn validate_input(req: &GenerationRequest) -> Result<()> {
    let required: Vec<(&str, &str)> = match req {
        GenerationRequest::Html(r) => vec![("description", r.description.as_str())],
        GenerationRequest::Css(r) => vec![("mockup_description", r.mockup_description.as_str())],
        GenerationRequest::React(r) => vec![("component_description", r.component_description.as_str())],
        GenerationRequest::Enhance(r) => vec![
            ("existing_code", r.existing_code.as_str()),
            ("enhancement_request", r.enhancement_request.as_str()),
        ],
        GenerationRequest::Fix(r) => vec![
            ("problematic_code", r.problematic_code.as_str()),
            ("issues_description", r.issues_description.as_str()),
        ],
        GenerationRequest::Website(r) => vec![("site_description", r.site_description.as_str())],
    };
    match required.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((field, _)) => Err(GenError::InvalidRequest(format!("{field} must not be empty"))),
        None => Ok(()),
    }
}
