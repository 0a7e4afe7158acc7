use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use parking_lot::RwLock;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout_at, Instant};
use tokio_stream::wrappers::ReceiverStream;

use super::{Provider, Readiness, TokenStream};
use crate::config::Config;
use crate::errors::{ConnectionKind, GenError, Result};
use crate::wire::{ChatMessage, GenerateOptions, ModelStatus};
use crate::{log, prompt, safety};

const STREAM_BUFFER: usize = 64;

/// Client for a local Ollama server.
pub struct OllamaClient {
    base_url: String,
    config: Arc<Config>,
    client: Client,
    readiness: RwLock<Readiness>,
    /// Held for the whole start-up probe; `Some` once it has succeeded.
    init: Mutex<Option<Vec<ModelStatus>>>,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerateOptions,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, PartialEq, Eq)]
struct Decoded {
    token: Option<String>,
    done: bool,
}

impl OllamaClient {
    /// Fails unless the configured server address is loopback.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let url = safety::ensure_loopback(&config.ollama_url)?;
        let client = Client::builder()
            .connect_timeout(config.probe_timeout())
            .build()
            .map_err(|e| GenError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: url.as_str().trim_end_matches('/').to_string(),
            config,
            client,
            readiness: RwLock::new(Readiness::Uninitialized),
            init: Mutex::new(None),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn transport(&self, err: reqwest::Error) -> GenError {
        GenError::from_reqwest(&err, &self.base_url)
    }

    async fn check_connection(&self) -> Result<()> {
        let resp = self
            .client
            .get(self.api_url("/version"))
            .timeout(self.config.probe_timeout())
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        if !resp.status().is_success() {
            return Err(GenError::connection(
                ConnectionKind::Unreachable,
                &self.base_url,
                format!("version probe returned {}", resp.status()),
            ));
        }
        Ok(())
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(self.api_url("/tags"))
            .timeout(self.config.list_timeout())
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        if !resp.status().is_success() {
            return Err(GenError::connection(
                ConnectionKind::Server,
                &self.base_url,
                format!("failed to list models: {}", resp.status()),
            ));
        }
        let text = resp.text().await.map_err(|e| self.transport(e))?;
        let tags: TagsResponse = serde_json::from_str(&text).map_err(|e| {
            GenError::connection(ConnectionKind::Payload, &self.base_url, format!("bad model listing: {e}"))
        })?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn probe(&self) -> Result<Vec<ModelStatus>> {
        self.check_connection().await?;
        let statuses = self.model_statuses().await?;
        let missing: Vec<String> = statuses.iter().filter(|s| !s.available).map(|s| s.name.clone()).collect();
        if !missing.is_empty() {
            return Err(GenError::models_missing(&missing, &self.base_url));
        }
        Ok(statuses)
    }

    async fn read_error_body(&self, resp: Response, deadline: Instant) -> GenError {
        let status = resp.status();
        let text = match timeout_at(deadline, resp.text()).await {
            Ok(Ok(t)) => t,
            _ => String::new(),
        };
        GenError::connection(
            ConnectionKind::Server,
            &self.base_url,
            format!("Ollama API error {}: {}", status, text.trim()),
        )
    }

    async fn post_generate(&self, body: &GenerateBody<'_>, deadline: Instant) -> Result<Response> {
        let send = self.client.post(self.api_url("/generate")).json(body).send();
        let resp = match timeout_at(deadline, send).await {
            Err(_) => return Err(self.timed_out(body.model)),
            Ok(r) => r.map_err(|e| self.transport(e))?,
        };
        if !resp.status().is_success() {
            return Err(self.read_error_body(resp, deadline).await);
        }
        Ok(resp)
    }

    fn timed_out(&self, model: &str) -> GenError {
        timed_out(&self.base_url, model, self.config.timeout_secs)
    }

    fn ensure_usable(&self, model: &str) -> Result<()> {
        if *self.readiness.read() != Readiness::Ready {
            return Err(GenError::NotInitialized);
        }
        if !safety::model_is_allowed(model, &self.config.required_models) {
            return Err(GenError::model_not_allowed(model, &self.config.required_models));
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for OllamaClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn readiness(&self) -> Readiness {
        self.readiness.read().clone()
    }

    async fn initialize(&self) -> Result<Vec<ModelStatus>> {
        let mut done = self.init.lock().await;
        if let Some(statuses) = done.as_ref() {
            return Ok(statuses.clone());
        }

        *self.readiness.write() = Readiness::Initializing;
        tracing::info!(url = %self.base_url, "checking Ollama server");
        match self.probe().await {
            Ok(statuses) => {
                tracing::info!(models = ?self.config.required_models, "Ollama ready");
                *done = Some(statuses.clone());
                *self.readiness.write() = Readiness::Ready;
                Ok(statuses)
            }
            Err(e) => {
                tracing::error!("Ollama initialization failed: {}", e);
                *self.readiness.write() = Readiness::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn model_statuses(&self) -> Result<Vec<ModelStatus>> {
        let hosted = self.list_models().await?;
        Ok(self
            .config
            .required_models
            .iter()
            .map(|name| ModelStatus { name: name.clone(), available: is_hosted(name, &hosted) })
            .collect())
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: &GenerateOptions,
    ) -> Result<TokenStream> {
        self.ensure_usable(model)?;

        let prompt = prompt::format_conversation(messages);
        log::prompt_summary(messages, model);

        let deadline = Instant::now() + self.config.timeout();
        let body = GenerateBody { model, prompt: &prompt, stream: true, options };
        let resp = self.post_generate(&body, deadline).await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let base_url = self.base_url.clone();
        let model = model.to_string();
        let timeout_secs = self.config.timeout_secs;
        tokio::spawn(async move {
            pump(Box::pin(resp.bytes_stream()), tx, deadline, &base_url, &model, timeout_secs).await;
        });
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn generate_once(&self, prompt: &str, model: &str, options: &GenerateOptions) -> Result<String> {
        self.ensure_usable(model)?;

        #[derive(Deserialize)]
        struct Once {
            #[serde(default)]
            response: String,
            #[serde(default)]
            error: Option<serde_json::Value>,
        }

        let deadline = Instant::now() + self.config.timeout();
        let body = GenerateBody { model, prompt, stream: false, options };
        let resp = self.post_generate(&body, deadline).await?;
        let text = match timeout_at(deadline, resp.text()).await {
            Err(_) => return Err(self.timed_out(model)),
            Ok(t) => t.map_err(|e| self.transport(e))?,
        };
        let once: Once = serde_json::from_str(&text).map_err(|e| {
            GenError::connection(ConnectionKind::Payload, &self.base_url, format!("bad generate response: {e}"))
        })?;
        if let Some(err) = once.error {
            return Err(GenError::connection(ConnectionKind::Payload, &self.base_url, error_text(&err)));
        }
        Ok(once.response)
    }
}

/// Forward decoded increments until the server is done, the deadline passes,
/// or the consumer goes away.
async fn pump<B>(
    mut body: B,
    tx: mpsc::Sender<Result<String>>,
    deadline: Instant,
    base_url: &str,
    model: &str,
    timeout_secs: u64,
) where
    B: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    let mut lines = LineBuffer::default();

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                tracing::debug!(model, "stream consumer dropped, abandoning generation");
                return;
            }
            next = timeout_at(deadline, body.next()) => next,
        };

        let (batch, finished) = match next {
            Err(_) => {
                let _ = tx.send(Err(timed_out(base_url, model, timeout_secs))).await;
                return;
            }
            Ok(Some(Ok(bytes))) => (lines.push(&bytes), false),
            Ok(Some(Err(e))) => {
                let _ = tx.send(Err(GenError::from_reqwest(&e, base_url))).await;
                return;
            }
            Ok(None) => (lines.finish(), true),
        };

        for line in batch {
            match decode_line(&line) {
                Ok(None) => continue,
                Ok(Some(decoded)) => {
                    if let Some(token) = decoded.token {
                        if tx.send(Ok(token)).await.is_err() {
                            tracing::debug!(model, "stream consumer dropped, abandoning generation");
                            return;
                        }
                    }
                    if decoded.done {
                        return;
                    }
                }
                Err(message) => {
                    let _ = tx.send(Err(GenError::connection(ConnectionKind::Payload, base_url, message))).await;
                    return;
                }
            }
        }

        if finished {
            return;
        }
    }
}

fn timed_out(base_url: &str, model: &str, timeout_secs: u64) -> GenError {
    GenError::connection(
        ConnectionKind::TimedOut,
        base_url,
        format!("no complete response from {model} within {timeout_secs}s"),
    )
}

/// `Ok(None)` for lines that carry nothing usable; `Err` for a server error payload.
fn decode_line(line: &[u8]) -> std::result::Result<Option<Decoded>, String> {
    let text = match std::str::from_utf8(line) {
        Ok(t) => t.trim(),
        Err(e) => {
            tracing::warn!("skipping undecodable stream line: {}", e);
            return Ok(None);
        }
    };
    if text.is_empty() {
        return Ok(None);
    }
    let chunk: GenerateChunk = match serde_json::from_str(text) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("failed to parse Ollama stream line ({}): {}", e, text);
            return Ok(None);
        }
    };
    if let Some(err) = chunk.error {
        return Err(format!("Ollama error: {}", error_text(&err)));
    }
    let token = (!chunk.response.is_empty()).then_some(chunk.response);
    Ok(Some(Decoded { token, done: chunk.done }))
}

fn error_text(err: &serde_json::Value) -> String {
    match err {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `llama3` is served as `llama3:latest`.
fn is_hosted(required: &str, hosted: &[String]) -> bool {
    hosted
        .iter()
        .any(|h| h == required || (!required.contains(':') && *h == format!("{required}:latest")))
}

/// Splits a byte stream into newline-terminated lines.
#[derive(Default)]
struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(data);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            out.push(line[..pos].to_vec());
        }
        out
    }

    fn finish(&mut self) -> Vec<Vec<u8>> {
        if self.buf.is_empty() {
            Vec::new()
        } else {
            vec![self.buf.split().to_vec()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> Arc<Config> {
        Arc::new(Config { ollama_url: server.uri(), ..Config::default() })
    }

    async fn mount_healthy(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"version": "0.5.1"})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "llama3.2:3b"}, {"name": "gpt-oss-20b"}, {"name": "phi3:latest"}]
            })))
            .mount(server)
            .await;
    }

    async fn ready_client(server: &MockServer) -> OllamaClient {
        mount_healthy(server).await;
        let client = OllamaClient::new(config_for(server)).unwrap();
        client.initialize().await.unwrap();
        client
    }

    fn ndjson(lines: &[&str]) -> String {
        lines.iter().map(|l| format!("{l}\n")).collect()
    }

    async fn collect(stream: TokenStream) -> Vec<Result<String>> {
        stream.collect().await
    }

    fn opts() -> GenerateOptions {
        GenerateOptions::from_config(&Config::default())
    }

    #[test]
    fn refuses_remote_servers_at_construction() {
        let cfg = Arc::new(Config { ollama_url: "http://192.168.0.10:11434".into(), ..Config::default() });
        assert!(matches!(OllamaClient::new(cfg), Err(GenError::Config(_))));
    }

    #[test]
    fn api_url_is_rooted_at_api() {
        let cfg = Arc::new(Config { ollama_url: "http://127.0.0.1:11434/".into(), ..Config::default() });
        let client = OllamaClient::new(cfg).unwrap();
        assert_eq!(client.api_url("/tags"), "http://127.0.0.1:11434/api/tags");
        assert_eq!(client.readiness(), Readiness::Uninitialized);
    }

    #[test]
    fn line_buffer_reassembles_split_lines() {
        let mut b = LineBuffer::default();
        assert!(b.push(b"{\"respo").is_empty());
        assert_eq!(b.push(b"nse\":\"a\"}\n{\"x\"").len(), 1);
        assert_eq!(b.finish(), vec![b"{\"x\"".to_vec()]);
        assert!(b.finish().is_empty());
    }

    #[test]
    fn decode_line_rules() {
        assert_eq!(decode_line(b"   "), Ok(None));
        assert_eq!(decode_line(b"{not json"), Ok(None));
        assert_eq!(decode_line(&[0xff, 0xfe]), Ok(None));
        assert_eq!(
            decode_line(br#"{"response":"","done":false}"#),
            Ok(Some(Decoded { token: None, done: false }))
        );
        assert_eq!(
            decode_line(br#"{"response":"hi","done":true}"#),
            Ok(Some(Decoded { token: Some("hi".into()), done: true }))
        );
        assert!(decode_line(br#"{"error":"model crashed"}"#).unwrap_err().contains("model crashed"));
    }

    #[test]
    fn latest_tag_counts_as_hosted() {
        let hosted = vec!["phi3:latest".to_string(), "llama3.2:3b".to_string()];
        assert!(is_hosted("phi3", &hosted));
        assert!(is_hosted("llama3.2:3b", &hosted));
        assert!(!is_hosted("llama3.2", &hosted));
    }

    /// Body that delivers `lines` and then stalls without ever ending.
    fn stalled_body(lines: &[&str]) -> impl Stream<Item = reqwest::Result<Bytes>> + Unpin {
        let chunks: Vec<reqwest::Result<Bytes>> =
            lines.iter().map(|l| Ok(Bytes::from(format!("{l}\n")))).collect();
        futures::stream::iter(chunks).chain(futures::stream::pending())
    }

    #[tokio::test]
    async fn pump_stops_when_consumer_drops_mid_body() {
        let (tx, mut rx) = mpsc::channel(1);
        let deadline = Instant::now() + Duration::from_secs(60);
        let body = stalled_body(&[r#"{"response":"first","done":false}"#]);
        let task = tokio::spawn(async move {
            pump(body, tx, deadline, "http://localhost:11434", "llama3.2:3b", 60).await;
        });

        assert_eq!(rx.recv().await.unwrap().unwrap(), "first");
        drop(rx);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("pump exits after the consumer goes away")
            .unwrap();
    }

    #[tokio::test]
    async fn deadline_applies_to_a_stalled_body() {
        let (tx, rx) = mpsc::channel(8);
        let deadline = Instant::now() + Duration::from_millis(200);
        let body = stalled_body(&[r#"{"response":"partial","done":false}"#]);
        tokio::spawn(async move {
            pump(body, tx, deadline, "http://localhost:11434", "llama3.2:3b", 1).await;
        });

        let results: Vec<Result<String>> = ReceiverStream::new(rx).collect().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "partial");
        assert!(results[1].as_ref().unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn initialize_reports_all_required_models() {
        let server = MockServer::start().await;
        let client = ready_client(&server).await;
        assert_eq!(client.readiness(), Readiness::Ready);
        let again = client.initialize().await.unwrap();
        assert_eq!(
            again,
            vec![
                ModelStatus { name: "gpt-oss-20b".into(), available: true },
                ModelStatus { name: "llama3.2:3b".into(), available: true },
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_initialize_probes_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "llama3.2:3b"}, {"name": "gpt-oss-20b"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Arc::new(OllamaClient::new(config_for(&server)).unwrap());
        let calls: Vec<_> = (0..5)
            .map(|_| {
                let c = client.clone();
                tokio::spawn(async move { c.initialize().await })
            })
            .collect();
        let mut results = Vec::new();
        for call in calls {
            results.push(call.await.unwrap().unwrap());
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        server.verify().await;
    }

    #[tokio::test]
    async fn missing_models_fail_initialize_and_name_them() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": [{"name": "mistral"}]})))
            .mount(&server)
            .await;

        let client = OllamaClient::new(config_for(&server)).unwrap();
        let err = client.initialize().await.unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, GenError::ModelUnavailable { .. }));
        assert!(text.contains("gpt-oss-20b") && text.contains("llama3.2:3b"));
        assert!(matches!(client.readiness(), Readiness::Failed(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_connection_error_with_url() {
        // Port 9 (discard) is expected to refuse connections on loopback.
        let cfg = Arc::new(Config { ollama_url: "http://127.0.0.1:9".into(), ..Config::default() });
        let client = OllamaClient::new(cfg).unwrap();
        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, GenError::Connection { .. }), "{err:?}");
        assert!(err.to_string().contains("http://127.0.0.1:9"));
    }

    #[tokio::test]
    async fn generate_requires_initialize() {
        let server = MockServer::start().await;
        let client = OllamaClient::new(config_for(&server)).unwrap();
        let err = client.generate_stream(&[ChatMessage::user("hi")], "llama3.2:3b", &opts()).await;
        assert!(matches!(err, Err(GenError::NotInitialized)));
    }

    #[tokio::test]
    async fn generate_revalidates_model() {
        let server = MockServer::start().await;
        let client = ready_client(&server).await;
        let err = client.generate_stream(&[ChatMessage::user("hi")], "phi3", &opts()).await;
        assert!(matches!(err, Err(GenError::ModelUnavailable { .. })));
    }

    #[tokio::test]
    async fn streams_increments_skipping_empty_and_garbled() {
        let server = MockServer::start().await;
        let client = ready_client(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3.2:3b",
                "stream": true,
                "options": {"num_predict": 4096, "stop": ["User:", "Human:"]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(&[
                r#"{"response":"<h1>","done":false}"#,
                r#"{"response":"","done":false}"#,
                "garbage{",
                "",
                r#"{"response":"Hi</h1>","done":false}"#,
                r#"{"response":"","done":true}"#,
                r#"{"response":"after done","done":false}"#,
            ])))
            .mount(&server)
            .await;

        let stream = client.generate_stream(&[ChatMessage::user("hi")], "llama3.2:3b", &opts()).await.unwrap();
        let tokens: Vec<String> = collect(stream).await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(tokens, vec!["<h1>", "Hi</h1>"]);
        assert!(tokens.iter().all(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_decoded() {
        let server = MockServer::start().await;
        let client = ready_client(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"response":"end","done":true}"#))
            .mount(&server)
            .await;
        let done = client.generate_complete(&[ChatMessage::user("x")], "llama3.2:3b", &opts()).await.unwrap();
        assert_eq!(done.content, "end");
        assert!(done.duration >= 0.0);
    }

    #[tokio::test]
    async fn error_payload_is_fatal() {
        let server = MockServer::start().await;
        let client = ready_client(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(&[
                r#"{"response":"par","done":false}"#,
                r#"{"error":"out of memory"}"#,
            ])))
            .mount(&server)
            .await;
        let results = collect(
            client.generate_stream(&[ChatMessage::user("x")], "llama3.2:3b", &opts()).await.unwrap(),
        )
        .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "par");
        match &results[1] {
            Err(GenError::Connection { kind, detail, .. }) => {
                assert_eq!(*kind, ConnectionKind::Payload);
                assert!(detail.contains("out of memory"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_error_status_surfaces_body() {
        let server = MockServer::start().await;
        let client = ready_client(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model runner crashed"))
            .mount(&server)
            .await;
        let err = match client.generate_stream(&[ChatMessage::user("x")], "llama3.2:3b", &opts()).await {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(err.to_string().contains("model runner crashed"));
    }

    #[tokio::test]
    async fn slow_server_times_out_distinctly() {
        let server = MockServer::start().await;
        mount_healthy(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;
        let cfg = Arc::new(Config { ollama_url: server.uri(), timeout_secs: 1, ..Config::default() });
        let client = OllamaClient::new(cfg).unwrap();
        client.initialize().await.unwrap();
        let err = match client.generate_stream(&[ChatMessage::user("x")], "llama3.2:3b", &opts()).await {
            Err(e) => e,
            Ok(_) => panic!("expected a timeout"),
        };
        assert!(err.is_timeout(), "{err:?}");
    }

    #[tokio::test]
    async fn generate_once_returns_response_field() {
        let server = MockServer::start().await;
        let client = ready_client(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({"stream": false, "prompt": "say hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": "hi", "done": true})))
            .mount(&server)
            .await;
        assert_eq!(client.generate_once("say hi", "gpt-oss-20b", &opts()).await.unwrap(), "hi");
    }
}
