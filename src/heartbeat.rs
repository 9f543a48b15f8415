//! Heartbeat monitor: ping cadence and pong timeout detection.
//!
//! The monitor itself only keeps bookkeeping. The session owns it inside its
//! locked state and decides on each tick whether a ping can go out; the
//! monitor tracks how long the current ping has been outstanding.
//!
//! `last_ping` is `None` while no ping is outstanding. The first tick after a
//! (re)start or a pong only arms it; later ticks compare against it.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::Instant;

use crate::timer::RepeatingTimer;

/// Result of checking the outstanding ping on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PingCheck {
    /// No ping was outstanding; the window starts now.
    Armed,
    /// A ping is outstanding but still within the timeout.
    Pending(Duration),
    /// A ping has been outstanding longer than the timeout.
    TimedOut(Duration),
}

/// Heartbeat bookkeeping. At most one timer is alive at any time.
#[derive(Debug, Default)]
pub(crate) struct Heartbeat {
    timer: Option<RepeatingTimer>,
    generation: u64,
    last_ping: Option<Instant>,
}

impl Heartbeat {
    /// Cancel any running timer and start a new one.
    ///
    /// `make_tick` receives the new generation, which the tick must present
    /// to [`Heartbeat::is_current`] so that a tick racing a restart is ignored.
    pub(crate) fn start<F, T>(&mut self, runtime: &Handle, period: Duration, make_tick: F)
    where
        F: FnOnce(u64) -> T,
        T: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        self.stop();
        self.generation = self.generation.wrapping_add(1);
        self.last_ping = None;
        self.timer = Some(RepeatingTimer::start(
            runtime,
            period,
            make_tick(self.generation),
        ));
    }

    /// Cancel the running timer, if any.
    pub(crate) fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.timer.is_some() && self.generation == generation
    }

    pub(crate) fn last_ping(&self) -> Option<Instant> {
        self.last_ping
    }

    pub(crate) fn period(&self) -> Option<Duration> {
        self.timer.as_ref().map(RepeatingTimer::period)
    }

    /// A pong arrived: nothing is outstanding any more.
    pub(crate) fn pong_received(&mut self) {
        self.last_ping = None;
    }

    /// Account for a tick at `now`.
    pub(crate) fn check(&mut self, now: Instant, timeout: Duration) -> PingCheck {
        match self.last_ping {
            None => {
                self.last_ping = Some(now);
                PingCheck::Armed
            }
            Some(sent) => {
                let elapsed = now.saturating_duration_since(sent);
                if elapsed > timeout {
                    PingCheck::TimedOut(elapsed)
                } else {
                    PingCheck::Pending(elapsed)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(60);

    #[test]
    fn test_first_check_arms() {
        let mut hb = Heartbeat::default();
        let t0 = Instant::now();
        assert_eq!(hb.check(t0, TIMEOUT), PingCheck::Armed);
        assert_eq!(hb.last_ping(), Some(t0));
    }

    #[test]
    fn test_timeout_is_strictly_greater() {
        let mut hb = Heartbeat::default();
        let t0 = Instant::now();
        hb.check(t0, TIMEOUT);
        assert_eq!(
            hb.check(t0 + TIMEOUT, TIMEOUT),
            PingCheck::Pending(TIMEOUT)
        );
        let later = TIMEOUT + Duration::from_secs(5);
        assert_eq!(hb.check(t0 + later, TIMEOUT), PingCheck::TimedOut(later));
        // The window is not reset by a timeout.
        assert_eq!(hb.last_ping(), Some(t0));
    }

    #[test]
    fn test_pong_rearms() {
        let mut hb = Heartbeat::default();
        let t0 = Instant::now();
        hb.check(t0, TIMEOUT);
        hb.pong_received();
        assert_eq!(hb.last_ping(), None);
        let t1 = t0 + Duration::from_secs(90);
        assert_eq!(hb.check(t1, TIMEOUT), PingCheck::Armed);
        assert_eq!(hb.last_ping(), Some(t1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_timer() {
        let mut hb = Heartbeat::default();
        let handle = Handle::current();
        hb.start(&handle, Duration::from_secs(5), |_| || ControlFlow::Continue(()));
        let first = hb.generation;
        hb.check(Instant::now(), TIMEOUT);

        hb.start(&handle, Duration::from_secs(5), |_| || ControlFlow::Continue(()));
        assert!(hb.is_running());
        assert!(!hb.is_current(first));
        assert!(hb.is_current(first + 1));
        assert_eq!(hb.last_ping(), None);

        hb.stop();
        assert!(!hb.is_running());
        assert!(!hb.is_current(first + 1));
        assert_eq!(hb.period(), None);
    }
}
