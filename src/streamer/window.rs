//!
//! The host-side sliding send window (§4.5 / C8): bounds how many unacked
//! lines are in flight and tracks per-line retry state.
//!

use std::time::{Duration, Instant};

///
/// One line the streamer has sent but not yet had acked.
///
#[derive(Debug, Clone)]
pub struct InflightLine {
    pub seq: u64,
    pub line: String,
    pub sent_at: Instant,
    pub attempts: u32,
}

///
/// What the caller should do after `SendWindow::poll_timeouts` runs.
///
#[derive(Debug, Clone, PartialEq)]
pub enum TimeoutAction {
    /// Resend this line; its attempt counter has already been incremented.
    Resend { seq: u64, line: String },
    /// The line exhausted its retry budget; the streamer should give up.
    GiveUp { seq: u64 },
}

///
/// Bounded FIFO of in-flight lines, mirroring the controller's own queue
/// capacity so the host never sends faster than the controller can drain.
///
pub struct SendWindow {
    capacity: usize,
    ack_timeout: Duration,
    max_retries: u32,
    inflight: Vec<InflightLine>,
}

impl SendWindow {
    pub fn new(capacity: usize, ack_timeout: Duration, max_retries: u32) -> Self {
        SendWindow {
            capacity,
            ack_timeout,
            max_retries,
            inflight: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.inflight.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }

    /// Records a freshly-sent line as in flight.
    pub fn push(&mut self, seq: u64, line: String, now: Instant) {
        self.inflight.push(InflightLine {
            seq,
            line,
            sent_at: now,
            attempts: 1,
        });
    }

    /// Removes the in-flight line for `seq` once it has been acked.
    pub fn ack(&mut self, seq: u64) {
        self.inflight.retain(|l| l.seq != seq);
    }

    /// Drops an in-flight line outright, e.g. on a fatal controller error.
    pub fn drop_seq(&mut self, seq: u64) {
        self.inflight.retain(|l| l.seq != seq);
    }

    /// Returns the in-flight lines preceding `gap_seq`, in seq order, bumping
    /// their attempt counter and resetting `sent_at` to `now` as if they had
    /// just been resent. Used to recover from a controller-reported `GAP`
    /// (§4.6): those are the lines the controller is still waiting on.
    pub fn resend_before(&mut self, gap_seq: u64, now: Instant) -> Vec<(u64, String)> {
        let mut due: Vec<&mut InflightLine> = self
            .inflight
            .iter_mut()
            .filter(|l| l.seq < gap_seq)
            .collect();
        due.sort_by_key(|l| l.seq);

        due.into_iter()
            .map(|l| {
                l.attempts += 1;
                l.sent_at = now;
                (l.seq, l.line.clone())
            })
            .collect()
    }

    /// Scans for lines whose ack has timed out, returning one action per
    /// timed-out line. Resent lines have their `sent_at` reset to `now` and
    /// their attempt counter bumped; lines past `max_retries` are evicted
    /// from the window entirely and reported as `GiveUp`.
    pub fn poll_timeouts(&mut self, now: Instant) -> Vec<TimeoutAction> {
        let mut actions = Vec::new();
        let mut give_up = Vec::new();

        for line in self.inflight.iter_mut() {
            if now.duration_since(line.sent_at) < self.ack_timeout {
                continue;
            }
            if line.attempts > self.max_retries {
                give_up.push(line.seq);
                continue;
            }
            line.attempts += 1;
            line.sent_at = now;
            actions.push(TimeoutAction::Resend {
                seq: line.seq,
                line: line.line.clone(),
            });
        }

        for seq in give_up {
            self.inflight.retain(|l| l.seq != seq);
            actions.push(TimeoutAction::GiveUp { seq });
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_to_capacity() {
        let mut window = SendWindow::new(2, Duration::from_millis(250), 3);
        let now = Instant::now();
        assert!(!window.is_full());
        window.push(1, "N1 G28".into(), now);
        window.push(2, "N2 G1 X1 Y0".into(), now);
        assert!(window.is_full());
    }

    #[test]
    fn ack_frees_a_slot() {
        let mut window = SendWindow::new(1, Duration::from_millis(250), 3);
        let now = Instant::now();
        window.push(1, "N1 G28".into(), now);
        assert!(window.is_full());
        window.ack(1);
        assert!(!window.is_full());
    }

    #[test]
    fn timeout_triggers_resend_then_give_up() {
        let mut window = SendWindow::new(4, Duration::from_millis(10), 2);
        let t0 = Instant::now();
        window.push(1, "N1 G1 X1 Y0".into(), t0);

        let t1 = t0 + Duration::from_millis(20);
        assert_eq!(
            window.poll_timeouts(t1),
            vec![TimeoutAction::Resend {
                seq: 1,
                line: "N1 G1 X1 Y0".into()
            }]
        );

        let t2 = t1 + Duration::from_millis(20);
        assert_eq!(
            window.poll_timeouts(t2),
            vec![TimeoutAction::Resend {
                seq: 1,
                line: "N1 G1 X1 Y0".into()
            }]
        );

        let t3 = t2 + Duration::from_millis(20);
        assert_eq!(
            window.poll_timeouts(t3),
            vec![TimeoutAction::GiveUp { seq: 1 }]
        );
        assert!(window.is_empty());
    }

    #[test]
    fn resend_before_returns_only_earlier_seqs_in_order() {
        let mut window = SendWindow::new(4, Duration::from_millis(250), 3);
        let now = Instant::now();
        window.push(1, "N1 G28".into(), now);
        window.push(2, "N2 G1 X1 Y0".into(), now);
        window.push(3, "N3 G1 X2 Y0".into(), now);

        let later = now + Duration::from_millis(5);
        let due = window.resend_before(3, later);
        assert_eq!(
            due,
            vec![(1, "N1 G28".to_string()), (2, "N2 G1 X1 Y0".to_string())]
        );
    }

    #[test]
    fn untimed_out_lines_are_left_alone() {
        let mut window = SendWindow::new(4, Duration::from_millis(250), 3);
        let now = Instant::now();
        window.push(1, "N1 G28".into(), now);
        assert!(
            window
                .poll_timeouts(now + Duration::from_millis(10))
                .is_empty()
        );
    }
}
