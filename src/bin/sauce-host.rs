//!
//! The host binary: compiles a drawing file into SSG lines and streams them
//! to a running controller, with optional resume after a dropped connection.
//!

use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::info;

use saucecore::compiler::{CompileOptions, Drawing, compile};
use saucecore::config::MachineConfig;
use saucecore::streamer::{self, Progress};

#[derive(Parser, Debug)]
#[command(about = "Sauce-plotting CNC host streamer")]
struct Args {
    /// Drawing JSON file to compile and stream.
    drawing: String,

    /// Controller address.
    #[arg(long, default_value = "127.0.0.1:8420")]
    connect: String,

    /// Simplification tolerance in millimetres; omit to skip simplification.
    #[arg(long)]
    simplify: Option<f64>,

    /// Resume a stream, skipping lines already acked up to this seq.
    #[arg(long, default_value_t = 0)]
    resume_from: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let raw = std::fs::read_to_string(&args.drawing)?;
    let drawing: Drawing = serde_json::from_str(&raw)?;

    let options = CompileOptions {
        simplify_epsilon_mm: args.simplify,
        ..CompileOptions::default()
    };
    let lines = compile(&drawing, &options)?;
    info!(count = lines.len(), "compiled drawing");

    let stream = TcpStream::connect(&args.connect).await?;

    let resume_from = if args.resume_from > 0 {
        args.resume_from
    } else {
        query_last_acked(&args.connect).await.unwrap_or(0)
    };
    if resume_from > 0 {
        info!(resume_from, "resuming stream");
    }

    let config = MachineConfig::default();
    streamer::stream(stream, &lines, &config, resume_from, |p: Progress| {
        info!(acked = p.acked, total = p.total, "progress");
    })
    .await?;

    info!("stream complete");
    Ok(())
}

/// Opens a short-lived connection to ask the controller for its current
/// `last_acked_seq`, so a freshly (re)launched host can resume mid-job.
async fn query_last_acked(addr: &str) -> Option<u64> {
    let mut stream = TcpStream::connect(addr).await.ok()?;
    stream.write_all(b"M408\n").await.ok()?;

    let mut reader = BufReader::new(stream);
    let deadline = tokio::time::Instant::now() + Duration::from_millis(500);

    while tokio::time::Instant::now() < deadline {
        let mut line = String::new();
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let n = tokio::time::timeout(remaining, reader.read_line(&mut line))
            .await
            .ok()?
            .ok()?;
        if n == 0 {
            return None;
        }
        if let Some(seq) = streamer::parse_last_acked(line.trim()) {
            return Some(seq);
        }
    }
    None
}
