// src/services/countdown.rs

use std::time::Duration;

use tokio::task::AbortHandle;

/// A one-tick-per-second countdown running on its own task.
///
/// The handle owns the task: `cancel` or dropping the handle stops it.
/// When the count reaches zero `on_expire` runs once on the countdown task;
/// it must not wait on anything that could drop this handle.
pub struct Countdown {
    handle: AbortHandle,
}

impl Countdown {
    pub fn start<F>(seconds: u64, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            // The first tick completes immediately.
            ticker.tick().await;

            for _ in 0..seconds {
                ticker.tick().await;
            }

            on_expire();
        });

        Self {
            handle: task.abort_handle(),
        }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
