use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use canvas::channel::{Channel, Transport, TransportError};
use canvas::engine::EngineCore;
use canvas::op::{Message as SyncMessage, WireError};
use canvas::surface::{Raster, RasterError};
use clap::{Args, Parser, Subcommand};
use frames::{FRAME_CLIENT_ID, FRAME_MESSAGE, Frame, SYSCALL_CONNECTED, SYSCALL_JOIN, SYSCALL_PART, Status};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::CodecError),
    #[error("timed out waiting for websocket frame")]
    Timeout,
    #[error("server returned error for {syscall}: {message}")]
    ServerError { syscall: String, message: String },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("script line {line}: {source}")]
    Script { line: usize, source: WireError },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("raster error: {0}")]
    Raster(#[from] RasterError),
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WsConnect(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "sketch", about = "Sketch board peer: watch, send, and render drawing traffic")]
struct Cli {
    #[arg(long, env = "SKETCH_URL", default_value = "http://127.0.0.1:3000")]
    url: String,

    #[arg(long, env = "SKETCH_ROOM", default_value = "lobby")]
    room: String,

    /// Speak protobuf binary frames instead of JSON text.
    #[arg(long, default_value_t = false)]
    binary: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    url: String,
    room: String,
    binary: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the relay is up.
    Ping,
    /// Replay a room's live traffic into a PNG.
    Watch(WatchArgs),
    /// Publish a JSONL script of drawing records to the room.
    Send(SendArgs),
    /// Replay a JSONL script offline into a PNG.
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 600)]
    height: u32,

    #[arg(long, help = "Stop after this many seconds (default: until Ctrl-C)")]
    duration: Option<u64>,
}

#[derive(Args, Debug)]
struct SendArgs {
    #[arg(default_value = "-", help = "Input file path, or - for stdin")]
    input: String,

    #[arg(long, default_value_t = 0, help = "Pause between messages, in milliseconds")]
    delay_ms: u64,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[arg(help = "Input file path, or - for stdin")]
    input: String,

    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 600)]
    height: u32,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = CliContext { url: cli.url, room: cli.room, binary: cli.binary };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Watch(args) => run_watch(&ctx, args).await,
        Command::Send(args) => run_send(&ctx, args).await,
        Command::Render(args) => run_render(args),
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let url = format!("{}/healthz", cli.url.trim_end_matches('/'));
    let response = reqwest::get(&url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError { syscall: format!("HTTP {}", status.as_u16()), message: url });
    }
    println!("ok");
    Ok(())
}

fn run_render(args: RenderArgs) -> Result<(), CliError> {
    let script = read_script(&args.input)?;
    let mut engine = EngineCore::new(args.width, args.height)?;
    for msg in &script {
        engine.apply_remote(msg);
    }
    write_png(&args.out, engine.canvas())?;
    eprintln!("rendered {} messages to {}", script.len(), args.out.display());
    Ok(())
}

async fn run_send(cli: &CliContext, args: SendArgs) -> Result<(), CliError> {
    let script = read_script(&args.input)?;

    let mut stream = connect(cli).await?;
    let client_id = wait_for_session_connected(&mut stream).await?;
    join_room(&mut stream, cli).await?;

    let mut channel = Channel::new(Outbox::default()).with_room(cli.room.clone());
    channel.connected(client_id);

    for msg in &script {
        channel.publish(msg);
        flush(&mut stream, &mut channel, cli.binary).await?;
        if args.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
        }
    }

    // The part reply comes after every frame above has been relayed.
    let part = Frame::request(SYSCALL_PART, json!({}));
    send_frame(&mut stream, &part, cli.binary).await?;
    wait_for_terminal_response(&mut stream, &part.id, SYSCALL_PART).await?;

    let stats = channel.stats();
    eprintln!("send complete: room={} sent={} dropped={}", cli.room, stats.sent, stats.dropped);
    Ok(())
}

/// How a watch session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchEnd {
    Deadline,
    Interrupted,
    Closed,
}

async fn run_watch(cli: &CliContext, args: WatchArgs) -> Result<(), CliError> {
    let mut engine = EngineCore::new(args.width, args.height)?;
    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut backoff = Backoff::default();

    loop {
        match watch_session(cli, &mut engine, deadline).await {
            Ok(WatchEnd::Deadline | WatchEnd::Interrupted) => break,
            Ok(WatchEnd::Closed) => {
                eprintln!("connection closed");
                backoff.reset();
            }
            Err(error) => eprintln!("watch error: {error}"),
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        let delay = backoff.next_delay();
        eprintln!("reconnecting in {}ms...", delay.as_millis());
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = sleep_until(deadline) => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    write_png(&args.out, engine.canvas())?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

async fn watch_session(
    cli: &CliContext,
    engine: &mut EngineCore,
    deadline: Option<Instant>,
) -> Result<WatchEnd, CliError> {
    let mut stream = connect(cli).await?;
    let client_id = wait_for_session_connected(&mut stream).await?;
    join_room(&mut stream, cli).await?;

    let mut channel = Channel::new(Outbox::default()).with_room(cli.room.clone());
    channel.connected(client_id);
    eprintln!("watching room {}", cli.room);

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let end = loop {
        tokio::select! {
            message = stream.next() => {
                let Some(Ok(message)) = message else { break WatchEnd::Closed };
                match decode_message(message) {
                    Ok(Some(frame)) => {
                        if let Some(msg) = channel.receive(&frame) {
                            engine.apply_remote(&msg);
                        }
                    }
                    Ok(None) => {}
                    Err(CliError::WsClosed) => break WatchEnd::Closed,
                    Err(error) => eprintln!("skipping frame: {error}"),
                }
            }
            _ = ticker.tick() => {
                engine.tick(frames::now_ms());
            }
            () = sleep_until(deadline) => break WatchEnd::Deadline,
            _ = tokio::signal::ctrl_c() => break WatchEnd::Interrupted,
        }
    };

    let stats = channel.stats();
    eprintln!(
        "session ended: delivered={} ignored={} rejected={}",
        stats.delivered, stats.ignored, stats.rejected
    );
    Ok(end)
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// Collects frames published through a [`Channel`] until the socket task
/// flushes them.
#[derive(Debug, Default)]
struct Outbox {
    frames: VecDeque<Frame>,
}

impl Transport for Outbox {
    fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.frames.push_back(frame);
        Ok(())
    }
}

/// Exponential reconnect delay.
#[derive(Debug, Clone, Copy)]
struct Backoff {
    current: Duration,
}

impl Backoff {
    const INITIAL: Duration = Duration::from_millis(250);
    const MAX: Duration = Duration::from_secs(8);

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(Self::MAX);
        delay
    }

    fn reset(&mut self) {
        self.current = Self::INITIAL;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self { current: Self::INITIAL }
    }
}

async fn flush(stream: &mut WsStream, channel: &mut Channel<Outbox>, binary: bool) -> Result<(), CliError> {
    while let Some(frame) = channel.transport_mut().frames.pop_front() {
        send_frame(stream, &frame, binary).await?;
    }
    Ok(())
}

async fn connect(cli: &CliContext) -> Result<WsStream, CliError> {
    let url = ws_url(&cli.url)?;
    let (stream, _) = connect_async(url).await?;
    Ok(stream)
}

fn ws_url(base_url: &str) -> Result<String, CliError> {
    let base = base_url.trim_end_matches('/');
    for (from, to) in [("http://", "ws://"), ("https://", "wss://"), ("ws://", "ws://"), ("wss://", "wss://")] {
        if let Some(rest) = base.strip_prefix(from) {
            if !rest.is_empty() {
                return Ok(format!("{to}{rest}/api/ws"));
            }
        }
    }
    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

async fn send_frame(stream: &mut WsStream, frame: &Frame, binary: bool) -> Result<(), CliError> {
    let message = if binary {
        Message::Binary(frames::encode_frame(frame).into())
    } else {
        Message::Text(serde_json::to_string(frame)?.into())
    };
    stream.send(message).await?;
    Ok(())
}

async fn join_room(stream: &mut WsStream, cli: &CliContext) -> Result<(), CliError> {
    let join = Frame::request(SYSCALL_JOIN, json!({ "room": cli.room }));
    send_frame(stream, &join, cli.binary).await?;
    wait_for_terminal_response(stream, &join.id, SYSCALL_JOIN).await?;
    Ok(())
}

/// Wait for the relay's greeting and return our client id.
async fn wait_for_session_connected(stream: &mut WsStream) -> Result<String, CliError> {
    loop {
        let frame = recv_next(stream, Duration::from_secs(5)).await?;
        if frame.syscall == SYSCALL_CONNECTED {
            return frame.data_str(FRAME_CLIENT_ID).map(ToOwned::to_owned).ok_or(CliError::MissingField("client_id"));
        }
    }
}

async fn wait_for_terminal_response(stream: &mut WsStream, request_id: &str, syscall: &str) -> Result<Frame, CliError> {
    loop {
        let frame = recv_next(stream, Duration::from_secs(15)).await?;
        if frame.parent_id.as_deref() != Some(request_id) || frame.syscall != syscall {
            if frame.status == Status::Error {
                eprintln!("relay error for {}: {}", frame.syscall, error_message(&frame));
            }
            continue;
        }
        if !frame.status.is_terminal() {
            continue;
        }
        if frame.status == Status::Error {
            return Err(CliError::ServerError { message: error_message(&frame).to_owned(), syscall: frame.syscall });
        }
        return Ok(frame);
    }
}

fn error_message(frame: &Frame) -> &str {
    frame.data_str(FRAME_MESSAGE).unwrap_or("unknown websocket error")
}

async fn recv_next(stream: &mut WsStream, timeout: Duration) -> Result<Frame, CliError> {
    let fut = async {
        loop {
            let Some(message) = stream.next().await else {
                return Err(CliError::WsClosed);
            };
            if let Some(frame) = decode_message(message?)? {
                return Ok(frame);
            }
        }
    };

    tokio::time::timeout(timeout, fut).await.map_err(|_| CliError::Timeout)?
}

/// Decode one websocket message. Control messages yield `None`.
fn decode_message(message: Message) -> Result<Option<Frame>, CliError> {
    match message {
        Message::Text(text) => Ok(Some(serde_json::from_str(text.as_str())?)),
        Message::Binary(bytes) => Ok(Some(frames::decode_frame(&bytes)?)),
        Message::Close(_) => Err(CliError::WsClosed),
        _ => Ok(None),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// =============================================================================
// SCRIPTS AND OUTPUT
// =============================================================================

fn read_script(input: &str) -> Result<Vec<SyncMessage>, CliError> {
    if input == "-" {
        parse_script(BufReader::new(io::stdin()))
    } else {
        parse_script(BufReader::new(File::open(input)?))
    }
}

/// Parse JSONL drawing records and `{"type":"clear"}` lines. Blank lines
/// are skipped; anything else that does not decode fails with its line
/// number.
fn parse_script(reader: impl BufRead) -> Result<Vec<SyncMessage>, CliError> {
    let mut messages = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(trimmed)?;
        let msg = SyncMessage::from_script_record(&record).map_err(|source| CliError::Script { line: index + 1, source })?;
        messages.push(msg);
    }
    Ok(messages)
}

fn write_png(path: &Path, raster: &Raster) -> Result<(), CliError> {
    std::fs::write(path, raster.encode_png()?)?;
    Ok(())
}
