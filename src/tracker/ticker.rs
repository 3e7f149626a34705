use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{sync::watch, task::JoinHandle};
use tokio_stream::{StreamExt, wrappers::IntervalStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::utils::clock::Clock;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Background task publishing the elapsed time of the running session once per period. Lives
/// exactly as long as the session: dropping the [Ticker] cancels it.
pub struct Ticker {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub fn spawn(
        started_at: DateTime<Utc>,
        clock: Arc<dyn Clock>,
        period: Duration,
        elapsed: Arc<watch::Sender<u64>>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut ticks = IntervalStream::new(tokio::time::interval(period));
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    tick = ticks.next() => {
                        if tick.is_none() {
                            break;
                        }
                        let now = clock.now().with_timezone(&Utc);
                        let ms = (now - started_at).num_milliseconds().max(0) as u64;
                        trace!(ms, "Timer tick");
                        elapsed.send_replace(ms);
                    }
                }
            }
            debug!("Timer stopped");
        });

        Self { shutdown, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
