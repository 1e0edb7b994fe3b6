//! The two entry points the CLI dispatches to: a one-shot local `run`, and
//! `serve`, which speaks the NDJSON broker↔runtime wire protocol over
//! stdin/stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use ascript_broker::{SessionManager, SharedSession};
use ascript_capabilities::{MapToolHandler, ToolHandler, ToolOutcome};
use ascript_events::{ControlMessage, ErrorInfo, Event, EventSink};
use ascript_presets::{Profile, stock_preset};
use ascript_protocol::CreateSessionRequest;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use crate::cli::SecurityLevelArg;
use crate::config::BrokerConfig;

/// No declared tools: every `callTool` a script makes resolves as
/// `UNKNOWN_TOOL`. Good enough for exercising the guard/rewriter/runtime
/// pipeline from the CLI; a host embedding this crate supplies its own
/// `ToolHandler` instead of going through `main.rs` at all.
fn default_tool_handler() -> Arc<dyn ToolHandler> {
    Arc::new(MapToolHandler::new())
}

/// Forwards every emitted event into an unbounded channel a consumer task
/// drains and writes out as NDJSON. Unbounded because this is a CLI, not a
/// service under load — there is exactly one reader, and it never falls far
/// enough behind to matter.
struct ChannelSink(mpsc::UnboundedSender<Event>);

impl EventSink for ChannelSink {
    fn on_event(&self, event: &Event) {
        let _ = self.0.send(event.clone());
    }
}

/// Subscribes to `session`'s emitter before reading its backlog, so no
/// event emitted concurrently with setup is lost. Returns the receiver plus
/// the backlog already captured at subscribe time, de-duplicated by `seq`
/// against whatever the channel also delivers.
async fn subscribe_with_backfill(session: &SharedSession) -> (mpsc::UnboundedReceiver<Event>, Vec<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let guard = session.lock().await;
    guard.emitter().subscribe(ChannelSink(tx));
    let backlog = guard.emitter().history();
    (rx, backlog)
}

/// Streams one session's events to a writer until it reaches a terminal
/// state, using `last_seq` to skip anything the backlog already printed.
async fn stream_events<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    session: &SharedSession,
    mut rx: mpsc::UnboundedReceiver<Event>,
    mut last_seq: Option<u64>,
) -> anyhow::Result<()> {
    loop {
        let Some(event) = rx.recv().await else { break };
        if last_seq.is_some_and(|seq| event.seq <= seq) {
            continue;
        }
        last_seq = Some(event.seq);
        writer.write_all(ascript_protocol::serialize_event(&event).as_bytes()).await?;
        writer.flush().await?;
        if session.lock().await.is_terminal() {
            while let Ok(event) = rx.try_recv() {
                if last_seq.is_some_and(|seq| event.seq <= seq) {
                    continue;
                }
                last_seq = Some(event.seq);
                writer.write_all(ascript_protocol::serialize_event(&event).as_bytes()).await?;
            }
            writer.flush().await?;
            break;
        }
    }
    Ok(())
}

pub async fn run(config: &BrokerConfig, file: PathBuf, level: SecurityLevelArg) -> anyhow::Result<()> {
    let code = tokio::fs::read_to_string(&file).await.with_context(|| format!("reading {}", file.display()))?;
    let preset = stock_preset(level.into(), Profile::AgentScript);
    let manager = SessionManager::new(config.max_sessions);

    let session = manager.create_session(&code, &preset, default_tool_handler()).await;
    let (rx, backlog) = subscribe_with_backfill(&session).await;

    let mut stdout = tokio::io::stdout();
    let mut last_seq = None;
    for event in &backlog {
        stdout.write_all(ascript_protocol::serialize_event(event).as_bytes()).await?;
        last_seq = Some(event.seq);
    }
    stdout.flush().await?;
    stream_events(&mut stdout, &session, rx, last_seq).await
}

pub async fn serve(config: &BrokerConfig) -> anyhow::Result<()> {
    let preset = stock_preset(config.security_level, Profile::AgentScript);
    let manager = SessionManager::new(config.max_sessions);

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let first_line = lines
        .next_line()
        .await?
        .context("expected a create_session request as the first line of stdin")?;
    let request: CreateSessionRequest =
        serde_json::from_str(&first_line).context("first line was not a valid create_session request")?;
    anyhow::ensure!(
        request.is_protocol_version_supported(),
        "unsupported protocolVersion {}",
        request.protocol_version
    );

    let preset = match request.limits {
        Some(overrides) => {
            let mut preset = preset;
            preset.limits = overrides.apply(preset.limits);
            preset
        }
        None => preset,
    };

    let session = manager.create_session(&request.code, &preset, default_tool_handler()).await;
    let session_id = session.lock().await.session_id().to_string();
    let (rx, backlog) = subscribe_with_backfill(&session).await;

    let writer_session = session.clone();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        let mut last_seq = None;
        for event in &backlog {
            let _ = stdout.write_all(ascript_protocol::serialize_event(event).as_bytes()).await;
            last_seq = Some(event.seq);
        }
        let _ = stdout.flush().await;
        let _ = stream_events(&mut stdout, &writer_session, rx, last_seq).await;
    });

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ControlMessage>(&line) {
            Ok(ControlMessage::ToolResultSubmit(payload)) => {
                let outcome = if payload.ok {
                    ToolOutcome::ok(payload.result.unwrap_or(serde_json::Value::Null))
                } else {
                    let error = payload.error.unwrap_or_else(|| ErrorInfo::new("tool call rejected"));
                    ToolOutcome::err(error.code.unwrap_or_else(|| "TOOL_ERROR".to_string()), error.message)
                };
                manager.submit_tool_result(&session_id, &payload.call_id, outcome).await;
            }
            Ok(ControlMessage::Cancel(payload)) => {
                manager.terminate_session(&session_id, payload.reason).await;
            }
            Err(e) => warn!(line, error = %e, "ignoring malformed control message"),
        }
        if session.lock().await.is_terminal() {
            break;
        }
    }

    let _ = writer.await;
    Ok(())
}
