use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;

use crate::clock::{MonotonicClock, TimeAnchor};
use crate::error::ClockError;
use crate::time_source::{DateProbe, fetch_authoritative_time};

const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of one complete pass over the endpoint list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub anchor: TimeAnchor,
    /// Endpoint that answered, `None` when every endpoint failed.
    pub source: Option<String>,
}

/// Single-slot hand-off from the sync worker to the tick loop. A newer report
/// overwrites one the tick loop has not collected yet.
#[derive(Debug, Default)]
pub struct AnchorCell {
    slot: Mutex<Option<SyncReport>>,
}

impl AnchorCell {
    pub fn publish(&self, report: SyncReport) {
        match self.slot.lock() {
            Ok(mut slot) => *slot = Some(report),
            Err(poisoned) => *poisoned.into_inner() = Some(report),
        }
    }

    pub fn take(&self) -> Option<SyncReport> {
        match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

struct SyncShared {
    latest: AnchorCell,
    stop: AtomicBool,
    resync_requested: AtomicBool,
    in_flight: AtomicBool,
}

/// Background worker that fetches network time once at start and then on
/// every resync interval, always starting from the first endpoint.
pub struct TimeSync {
    shared: Arc<SyncShared>,
    join: Option<JoinHandle<()>>,
}

impl TimeSync {
    pub fn start(
        endpoints: Vec<String>,
        resync_interval: Duration,
        probe: Box<dyn DateProbe>,
        monotonic: Arc<dyn MonotonicClock>,
    ) -> Result<Self, ClockError> {
        if endpoints.is_empty() {
            return Err(ClockError::InvalidConfig(
                "at least one time endpoint is required".to_string(),
            ));
        }
        if resync_interval.is_zero() {
            return Err(ClockError::InvalidConfig(
                "resync interval must be greater than zero".to_string(),
            ));
        }
        let shared = Arc::new(SyncShared {
            latest: AnchorCell::default(),
            stop: AtomicBool::new(false),
            resync_requested: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
        });
        let shared_for_thread = Arc::clone(&shared);
        let join = thread::Builder::new()
            .name("netclock-sync".to_string())
            .spawn(move || {
                run_sync_loop(
                    &shared_for_thread,
                    &endpoints,
                    resync_interval,
                    probe.as_ref(),
                    monotonic.as_ref(),
                )
            })
            .map_err(ClockError::SpawnWorker)?;
        Ok(Self {
            shared,
            join: Some(join),
        })
    }

    /// Collects the most recent report, if one arrived since the last call.
    pub fn take_latest(&self) -> Option<SyncReport> {
        self.shared.latest.take()
    }

    /// Asks for an immediate resync. Returns `false` when a fetch is already
    /// running; overlapping fetches are never started.
    pub fn request_sync(&self) -> bool {
        if self.shared.in_flight.load(Ordering::Acquire) {
            return false;
        }
        self.shared.resync_requested.store(true, Ordering::Release);
        true
    }
}

impl Drop for TimeSync {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn run_sync_loop(
    shared: &SyncShared,
    endpoints: &[String],
    resync_interval: Duration,
    probe: &dyn DateProbe,
    monotonic: &dyn MonotonicClock,
) {
    let mut next_fetch = Instant::now();
    while !shared.stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        let requested = shared.resync_requested.swap(false, Ordering::AcqRel);
        if !requested && now < next_fetch {
            thread::sleep(
                next_fetch
                    .saturating_duration_since(now)
                    .min(WORKER_POLL_INTERVAL),
            );
            continue;
        }

        shared.in_flight.store(true, Ordering::Release);
        let fetched = fetch_authoritative_time(probe, endpoints);
        let captured_at = monotonic.elapsed();
        let report = match fetched {
            Some(time) => SyncReport {
                anchor: TimeAnchor::known(time.at, captured_at),
                source: Some(time.endpoint),
            },
            None => SyncReport {
                anchor: TimeAnchor::unknown(captured_at),
                source: None,
            },
        };
        debug!("publishing time anchor from {:?}", report.source);
        shared.latest.publish(report);
        shared.in_flight.store(false, Ordering::Release);
        next_fetch = Instant::now() + resync_interval;
    }
}
