//!
//! The controller binary: accepts one SSG connection at a time over TCP,
//! drives `Controller` against a simulated step/pump backend, and ticks the
//! planner on a fixed interval (spec.md §5).
//!

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, broadcast};
use tokio::time::{Duration, interval};
use tracing::{info, warn};

use saucecore::config::MachineConfig;
use saucecore::controller::Controller;
use saucecore::hardware::io::SimulatedIo;
use saucecore::protocol::Reply;

const TICK_PERIOD_MS: u64 = 20;
/// Deep enough that a connection handler lagging by a tick or two still
/// catches up instead of dropping telemetry frames (`broadcast::Receiver`
/// reports `Lagged` once it falls behind this many unread values).
const TICK_REPLY_CHANNEL_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(about = "Sauce-plotting CNC controller")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8420")]
    listen: String,

    /// Path to a machine configuration JSON file; defaults built in if omitted.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => MachineConfig::load_from_file(path)?,
        None => MachineConfig::default(),
    };

    let controller = Arc::new(Mutex::new(Controller::new(
        config,
        SimulatedIo::new(),
        Instant::now(),
    )));
    controller.lock().await.complete_boot();

    // `tick()`'s replies (the ~1 Hz telemetry frame and unsolicited async
    // faults like `err code=HEARTBEAT`) have nowhere to go unless a
    // connection is up to claim them; a broadcast channel lets the ticker
    // run independently of connection lifetime while the active connection
    // forwards whatever it produces to its socket.
    let (tick_tx, _) = broadcast::channel::<Reply>(TICK_REPLY_CHANNEL_CAPACITY);

    let _ticker = {
        let controller = Arc::clone(&controller);
        let tick_tx = tick_tx.clone();
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_millis(TICK_PERIOD_MS));
            loop {
                tick.tick().await;
                let replies = {
                    let mut c = controller.lock().await;
                    c.tick(Instant::now())
                };
                for reply in replies {
                    // No active connection to hear it; the frame is simply lost.
                    let _ = tick_tx.send(reply);
                }
            }
        })
    };

    let listener = TcpListener::bind(&args.listen).await?;
    info!(addr = %args.listen, "controller listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        info!(%peer, "connection accepted");
        let (reader, mut writer) = socket.into_split();
        let mut reader = BufReader::new(reader);
        let controller = Arc::clone(&controller);
        let mut tick_rx = tick_tx.subscribe();

        let mut line = String::new();
        'connection: loop {
            tokio::select! {
                result = reader.read_line(&mut line) => {
                    let n = match result {
                        Ok(n) => n,
                        Err(err) => {
                            warn!(%err, "read error, dropping connection");
                            break 'connection;
                        }
                    };
                    if n == 0 {
                        info!(%peer, "connection closed");
                        break 'connection;
                    }

                    let replies = {
                        let mut c = controller.lock().await;
                        c.handle_line(line.trim_end(), Instant::now())
                    };
                    line.clear();

                    for reply in replies {
                        if write_reply(&mut writer, &reply).await.is_err() {
                            break 'connection;
                        }
                    }
                }
                tick_reply = tick_rx.recv() => {
                    match tick_reply {
                        Ok(reply) => {
                            if write_reply(&mut writer, &reply).await.is_err() {
                                break 'connection;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "fell behind on ticker replies, dropping them");
                        }
                        Err(broadcast::error::RecvError::Closed) => break 'connection,
                    }
                }
            }
        }
    }
}

async fn write_reply(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    reply: &Reply,
) -> std::io::Result<()> {
    writer.write_all(reply.to_wire().as_bytes()).await?;
    writer.write_all(b"\n").await
}
