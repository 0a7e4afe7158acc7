use std::pin::Pin;
use std::time::Instant;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::errors::Result;
use crate::wire::{ChatMessage, Completion, GenerateOptions, ModelStatus};

pub mod ollama;

pub use ollama::OllamaClient;

/// Text increments from one generation call. Every item is non-empty.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Where the client is in its start-up checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum Readiness {
    Uninitialized,
    Initializing,
    Ready,
    Failed(String),
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Base URL of the inference server, for error messages and health output.
    fn base_url(&self) -> &str;

    fn readiness(&self) -> Readiness;

    /// Connectivity probe plus required-model check. Single-flight and
    /// idempotent once it has succeeded.
    async fn initialize(&self) -> Result<Vec<ModelStatus>>;

    /// Fresh availability of every required model.
    async fn model_statuses(&self) -> Result<Vec<ModelStatus>>;

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: &GenerateOptions,
    ) -> Result<TokenStream>;

    /// Single non-streaming call on a raw prompt.
    async fn generate_once(&self, prompt: &str, model: &str, options: &GenerateOptions) -> Result<String>;

    async fn generate_complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: &GenerateOptions,
    ) -> Result<Completion> {
        let started = Instant::now();
        let mut stream = self.generate_stream(messages, model, options).await?;
        let mut content = String::new();
        while let Some(token) = stream.next().await {
            content.push_str(&token?);
        }
        Ok(Completion { content, duration: started.elapsed().as_secs_f64() })
    }
}

pub type DynProvider = std::sync::Arc<dyn Provider>;
