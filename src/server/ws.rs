//! Streaming generation over a WebSocket.
//!
//! Each connection runs one reader loop, one writer task and one worker
//! task. Requests are executed one at a time per connection; the configured
//! [`BusyPolicy`] decides whether a request that arrives mid-generation
//! waits in a bounded queue or is turned away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::AppState;
use crate::config::BusyPolicy;
use crate::errors::GenError;
use crate::pipeline::Generator;
use crate::wire::{Frame, GenerationKind, GenerationRequest, StreamEvent};

const OUTBOUND_BUFFER: usize = 64;
const CHUNK_BUFFER: usize = 32;

pub async fn stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Debug)]
pub(crate) struct Job {
    pub request_id: String,
    pub request: GenerationRequest,
}

/// Decides whether a new job may enter the connection's pipeline.
pub(crate) struct Admission {
    policy: BusyPolicy,
    busy: Arc<AtomicBool>,
    jobs: mpsc::Sender<Job>,
}

impl Admission {
    pub(crate) fn new(policy: BusyPolicy, queue_depth: usize) -> (Self, mpsc::Receiver<Job>, Arc<AtomicBool>) {
        let capacity = match policy {
            BusyPolicy::Queue => queue_depth.max(1),
            BusyPolicy::Reject => 1,
        };
        let (jobs, rx) = mpsc::channel(capacity);
        let busy = Arc::new(AtomicBool::new(false));
        (Self { policy, busy: busy.clone(), jobs }, rx, busy)
    }

    /// Hands the job back when the connection is busy.
    pub(crate) fn admit(&self, job: Job) -> Result<(), Job> {
        if self.policy == BusyPolicy::Reject && self.busy.swap(true, Ordering::SeqCst) {
            return Err(job);
        }
        match self.jobs.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) | Err(mpsc::error::TrySendError::Closed(job)) => {
                if self.policy == BusyPolicy::Reject {
                    self.busy.store(false, Ordering::SeqCst);
                }
                Err(job)
            }
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_writer, mut ws_reader) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Frame>(OUTBOUND_BUFFER);

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if ws_writer.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!("failed to serialize frame: {}", e),
            }
        }
        let _ = ws_writer.close().await;
    });

    let (admission, mut jobs, busy) = Admission::new(state.config.busy_policy, state.config.queue_depth);
    let generator = state.generator.clone();
    let worker_tx = out_tx.clone();
    let worker = tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            let terminal = run_job(&generator, job, &worker_tx).await;
            // Idle again before the client can see the terminal frame.
            busy.store(false, Ordering::SeqCst);
            if let Some(frame) = terminal {
                if worker_tx.send(frame).await.is_err() {
                    break;
                }
            }
        }
    });

    tracing::info!("stream connection opened");
    while let Some(msg) = ws_reader.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!("websocket read error: {}", e);
                break;
            }
        };
        match msg {
            Message::Text(text) => {
                if let Some(frame) = accept(&text, &admission) {
                    if out_tx.send(frame).await.is_err() {
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // In-flight and queued work is abandoned with the connection.
    worker.abort();
    drop(admission);
    drop(out_tx);
    let _ = writer.await;
    tracing::info!("stream connection closed");
}

/// Decode one inbound message and try to enqueue it. Returns the frame to
/// send back immediately when the message cannot be accepted.
pub(crate) fn accept(text: &str, admission: &Admission) -> Option<Frame> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) => return Some(error_frame(None, None, "Invalid message: expected a JSON object".into())),
        Err(e) => return Some(error_frame(None, None, format!("Invalid message: {e}"))),
    };

    let request_id = match value.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    let kind = match value.get("type").and_then(Value::as_str) {
        Some(t) => match t.parse::<GenerationKind>() {
            Ok(k) => k,
            Err(message) => return Some(error_frame(Some(request_id), None, message)),
        },
        None => return Some(error_frame(Some(request_id), None, "Missing request type".into())),
    };

    let request: GenerationRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            let err = GenError::InvalidRequest(e.to_string());
            return Some(error_frame(Some(request_id), Some(kind), format!("{}: {}", kind.failure_label(), err)));
        }
    };

    match admission.admit(Job { request_id, request }) {
        Ok(()) => None,
        Err(job) => {
            tracing::warn!(request_id = %job.request_id, "connection busy, request refused");
            Some(error_frame(
                Some(job.request_id),
                Some(kind),
                "Busy: another generation is in progress on this connection".into(),
            ))
        }
    }
}

/// Sends the status and chunk frames for one job and returns its terminal
/// frame. `None` when the job was cancelled or the connection went away.
async fn run_job(generator: &Generator, job: Job, out: &mpsc::Sender<Frame>) -> Option<Frame> {
    let Job { request_id, request } = job;
    let kind = request.kind();
    let frame = |event| Frame { request_id: Some(request_id.clone()), event };

    if out.send(frame(StreamEvent::Status { message: kind.activity().into() })).await.is_err() {
        return None;
    }

    let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(CHUNK_BUFFER);
    let generate = async move {
        let result = generator.run(&request, Some(&chunk_tx)).await;
        drop(chunk_tx);
        result
    };
    let frame = &frame;
    // Owns the receiver so a failed send closes it and cancels generation.
    let forward = async move {
        while let Some(content) = chunk_rx.recv().await {
            if out.send(frame(StreamEvent::Chunk { content })).await.is_err() {
                break;
            }
        }
    };
    let (result, ()) = tokio::join!(generate, forward);

    let terminal = match result {
        Ok(generation) => StreamEvent::Complete { kind, data: generation.artifacts },
        Err(GenError::Cancelled) => {
            tracing::debug!(request_id = %request_id, "generation cancelled");
            return None;
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, %kind, "{}: {}", kind.failure_label(), e);
            StreamEvent::Error { kind: Some(kind), message: format!("{}: {}", kind.failure_label(), e) }
        }
    };
    Some(frame(terminal))
}

fn error_frame(request_id: Option<String>, kind: Option<GenerationKind>, message: String) -> Frame {
    Frame { request_id, event: StreamEvent::Error { kind, message } }
}
