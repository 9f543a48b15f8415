//! Repeating timer backed by a tokio task.
//!
//! A [`RepeatingTimer`] is an owned handle: the ticking task lives exactly as
//! long as the handle, or until [`RepeatingTimer::cancel`] is called.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Fixed-interval repeating callback, cancelled on drop.
#[derive(Debug)]
pub struct RepeatingTimer {
    task: JoinHandle<()>,
    period: Duration,
}

impl RepeatingTimer {
    /// Spawn a timer on `runtime` calling `tick` every `period`.
    ///
    /// The first tick fires immediately. Returning [`ControlFlow::Break`]
    /// from `tick` stops the timer.
    ///
    /// `period` must be non-zero.
    pub fn start<F>(runtime: &Handle, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tick().is_break() {
                    break;
                }
            }
        });
        Self { task, period }
    }

    /// Stop ticking. A tick already executing runs to completion.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Whether the ticking task is still alive.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// The tick period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
