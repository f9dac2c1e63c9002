//!
//! The host-side streamer (C8): drives a compiled line sequence across a
//! transport to the controller, respecting the sliding window, retrying on
//! ack timeout, backing off on `busy`, and resuming a dropped connection
//! from the controller's reported `last_acked_seq` (SPEC_FULL.md §3).
//!

pub mod error;
pub mod window;

use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::config::MachineConfig;
use error::StreamerError;
use window::{SendWindow, TimeoutAction};

///
/// Emitted once per acked line so a caller (e.g. the CLI binary) can render
/// progress without the streamer owning any UI concerns.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub acked: usize,
    pub total: usize,
}

///
/// Streams `lines` to `transport`, returning once every line has been acked
/// or a fatal error/retry exhaustion occurs.
///
/// # Parameters:
/// - `lines`: compiled SSG lines, in send order, each already carrying its
///   own `N<seq>` prefix
/// - `resume_from`: skip lines whose seq is `<= resume_from` (0 sends everything)
///
pub async fn stream<S, F>(
    transport: S,
    lines: &[String],
    config: &MachineConfig,
    resume_from: u64,
    mut on_progress: F,
) -> Result<(), StreamerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(Progress),
{
    let (reader, mut writer) = tokio::io::split(transport);
    let mut reader = BufReader::new(reader);

    let pending: Vec<&String> = lines.iter().filter(|l| seq_of(l) > resume_from).collect();
    let total = lines.len();
    let mut acked = lines.len() - pending.len();

    let mut window = SendWindow::new(
        *config.window_size(),
        Duration::from_millis(*config.ack_timeout_ms()),
        *config.max_retries(),
    );

    let mut next = 0usize;
    let mut busy_until: Option<Instant> = None;
    let mut reply_line = String::new();

    loop {
        if acked == total {
            return Ok(());
        }

        let now = Instant::now();
        let may_send = busy_until.map(|t| now >= t).unwrap_or(true);

        if may_send && !window.is_full() && next < pending.len() {
            let line = pending[next].clone();
            let seq = seq_of(&line);
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            window.push(seq, line, now);
            next += 1;
            continue;
        }

        for action in window.poll_timeouts(now) {
            match action {
                TimeoutAction::Resend { seq, line } => {
                    warn!(seq, "ack timed out, resending");
                    writer.write_all(line.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                }
                TimeoutAction::GiveUp { seq } => {
                    return Err(StreamerError::RetriesExhausted {
                        seq,
                        retries: *config.max_retries(),
                    });
                }
            }
        }

        reply_line.clear();
        let read =
            tokio::time::timeout(Duration::from_millis(50), reader.read_line(&mut reply_line))
                .await;

        let n = match read {
            Ok(result) => result?,
            Err(_) => continue,
        };

        if n == 0 {
            return Err(StreamerError::ConnectionClosed);
        }

        let trimmed = reply_line.trim();
        if let Some(rest) = trimmed.strip_prefix("ok N") {
            let seq: u64 = rest.trim().parse().unwrap_or(0);
            window.ack(seq);
            acked += 1;
            on_progress(Progress { acked, total });
            debug!(seq, acked, total, "line acked");
        } else if let Some(rest) = trimmed.strip_prefix("busy") {
            let _ = rest;
            busy_until = Some(Instant::now() + Duration::from_millis(*config.busy_backoff_ms()));
        } else if let Some(rest) = trimmed.strip_prefix("err") {
            let seq: Option<u64> = rest
                .split_whitespace()
                .find(|t| t.starts_with('N'))
                .and_then(|tok| tok[1..].parse::<u64>().ok());
            let code = rest
                .split("code=")
                .nth(1)
                .unwrap_or("UNKNOWN")
                .trim()
                .to_owned();

            if code == "GAP" {
                warn!(?seq, "controller reported a sequence gap, resending");
                if let Some(gap_seq) = seq {
                    for (resent_seq, line) in window.resend_before(gap_seq, Instant::now()) {
                        debug!(seq = resent_seq, "resending line missing from controller");
                        writer.write_all(line.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                    }
                }
                continue;
            }

            if let Some(seq) = seq {
                window.drop_seq(seq);
            }
            return Err(StreamerError::ControllerError { seq, code });
        }
    }
}

fn seq_of(line: &str) -> u64 {
    line.strip_prefix('N')
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|tok| tok.parse().ok())
        .unwrap_or(0)
}

/// Parses a controller `status` reply for its `last_ack=` field, used to
/// resume a stream after a dropped connection (SPEC_FULL.md §3).
pub fn parse_last_acked(status_line: &str) -> Option<u64> {
    status_line
        .split_whitespace()
        .find_map(|tok| tok.strip_prefix("last_ack="))
        .and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn test_config() -> MachineConfig {
        MachineConfig::default()
    }

    #[tokio::test]
    async fn streams_and_acks_every_line_against_a_compliant_peer() {
        let (client, server) = duplex(4096);
        let lines = vec!["N1 G28".to_string(), "N2 G0 X10 Y0 F3000".to_string()];
        let config = test_config();

        let streamer = tokio::spawn(async move {
            let mut seen = Vec::new();
            stream(client, &lines, &config, 0, |p| seen.push(p))
                .await
                .unwrap();
            seen
        });

        let (read_half, mut write_half) = tokio::io::split(server);
        let mut buf = BufReader::new(read_half);
        let mut line = String::new();
        for expected_seq in [1u64, 2] {
            line.clear();
            buf.read_line(&mut line).await.unwrap();
            assert!(line.starts_with(&format!("N{expected_seq}")));
            write_half
                .write_all(format!("ok N{expected_seq}\n").as_bytes())
                .await
                .unwrap();
        }

        let progress = streamer.await.unwrap();
        assert_eq!(progress.last().unwrap(), &Progress { acked: 2, total: 2 });
    }

    #[tokio::test]
    async fn gap_error_resends_in_window_lines_and_continues() {
        let (client, server) = duplex(4096);
        let lines = vec![
            "N1 G28".to_string(),
            "N2 G0 X10 Y0 F3000".to_string(),
            "N3 M3 S50".to_string(),
        ];
        let config = test_config();

        let streamer = tokio::spawn(async move {
            let mut seen = Vec::new();
            stream(client, &lines, &config, 0, |p| seen.push(p))
                .await
                .unwrap();
            seen
        });

        let (read_half, mut write_half) = tokio::io::split(server);
        let mut buf = BufReader::new(read_half);
        let mut line = String::new();

        for expected_seq in [1u64, 2, 3] {
            line.clear();
            buf.read_line(&mut line).await.unwrap();
            assert!(line.starts_with(&format!("N{expected_seq}")));
        }

        write_half.write_all(b"err N3 code=GAP\n").await.unwrap();

        for expected_seq in [1u64, 2] {
            line.clear();
            buf.read_line(&mut line).await.unwrap();
            assert!(
                line.starts_with(&format!("N{expected_seq}")),
                "expected resend of N{expected_seq}, got {line:?}"
            );
        }

        for expected_seq in [1u64, 2, 3] {
            write_half
                .write_all(format!("ok N{expected_seq}\n").as_bytes())
                .await
                .unwrap();
        }

        let progress = streamer.await.unwrap();
        assert_eq!(progress.last().unwrap(), &Progress { acked: 3, total: 3 });
    }

    #[tokio::test]
    async fn non_gap_error_is_fatal_and_carries_the_parsed_seq() {
        let (client, server) = duplex(4096);
        let lines = vec!["N1 G1 X500 Y0 F600".to_string()];
        let config = test_config();

        let streamer =
            tokio::spawn(async move { stream(client, &lines, &config, 0, |_| {}).await });

        let (read_half, mut write_half) = tokio::io::split(server);
        let mut buf = BufReader::new(read_half);
        let mut line = String::new();
        buf.read_line(&mut line).await.unwrap();
        write_half.write_all(b"err N1 code=LIMIT\n").await.unwrap();

        let err = streamer.await.unwrap().unwrap_err();
        match err {
            StreamerError::ControllerError { seq, code } => {
                assert_eq!(seq, Some(1));
                assert_eq!(code, "LIMIT");
            }
            other => panic!("expected ControllerError, got {other:?}"),
        }
    }

    #[test]
    fn parses_last_ack_from_status_reply() {
        let status = "status state=Printing q=3 flow=60 sauce=ON last_ack=17";
        assert_eq!(parse_last_acked(status), Some(17));
    }

    #[test]
    fn resume_skips_already_acked_lines() {
        let lines = [
            "N1 G28".to_string(),
            "N2 G0 X10 Y0".to_string(),
            "N3 M3 S50".to_string(),
        ];
        let pending: Vec<&String> = lines.iter().filter(|l| seq_of(l) > 1).collect();
        assert_eq!(pending.len(), 2);
        assert_eq!(seq_of(pending[0]), 2);
    }
}
