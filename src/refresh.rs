//! Periodic re-render trigger.
//!
//! A [`RefreshTimer`] owns one tokio task that asks the host to re-render at a
//! fixed period, starting immediately. The task never renders anything
//! itself. Cancelling (or dropping) the handle aborts the task.

use crate::host::UpdateRequester;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug)]
pub struct RefreshTimer {
    task: JoinHandle<()>,
    ticks: Arc<AtomicU64>,
    period: Duration,
}

impl RefreshTimer {
    /// Spawn the periodic task on `runtime`. A zero period is raised to 1 ms.
    pub fn start(runtime: &Handle, period: Duration, requester: Arc<dyn UpdateRequester>) -> Self {
        let period = period.max(Duration::from_millis(1));
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&ticks);

        let task = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("refresh tick {}", n);
                requester.request_update_all();
            }
        });

        Self {
            task,
            ticks,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Update requests issued so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
