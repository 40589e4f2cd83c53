//! Continuous playback: ask the backend for a few more turns at a fixed cadence.

use crate::backend::SimulationBackend;
use crate::error::AdvanceError;
use crate::events::{EventBus, Signal};
use crate::sandbox::SandboxModel;
use botscope_protocol::PlaybackStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub type ErrorHandler = Arc<dyn Fn(&AdvanceError) + Send + Sync>;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_STEPS_PER_TICK: u32 = 2;

/// Fetches `steps` more turns and installs the result.
pub async fn advance_sandbox(
    backend: &dyn SimulationBackend,
    sandbox: &SandboxModel,
    steps: u32,
) -> Result<(), AdvanceError> {
    let snapshot = backend.advance(steps).await?;
    sandbox.set_state(snapshot)?;
    Ok(())
}

pub fn log_errors() -> ErrorHandler {
    Arc::new(|err: &AdvanceError| tracing::warn!(error = %err, "advance failed"))
}

#[derive(Default)]
struct Ticker {
    /// Bumped on every start; a ticker task only acts for its own generation.
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

struct Shared {
    bus: EventBus,
    sandbox: SandboxModel,
    backend: Arc<dyn SimulationBackend>,
    interval: Duration,
    steps: u32,
    in_flight: AtomicBool,
    on_error: ErrorHandler,
    ticker: Mutex<Ticker>,
}

impl Shared {
    async fn advance(&self) {
        if let Err(err) = advance_sandbox(self.backend.as_ref(), &self.sandbox, self.steps).await {
            (self.on_error)(&err);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ticker> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims a tick for `generation` and spawns its request. Checked under the
    /// ticker lock, so nothing is sent once `stop` has returned.
    fn fire(self: &Arc<Self>, generation: u64) -> bool {
        let ticker = self.lock();
        if ticker.handle.is_none() || ticker.generation != generation {
            return false;
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::trace!("previous advance still in flight, skipping tick");
            return false;
        }
        // Detached so that stopping playback does not cancel a request already sent.
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            shared.advance().await;
            shared.in_flight.store(false, Ordering::Release);
        });
        true
    }
}

/// Two-state ticker (stopped/running) that keeps the sandbox moving.
///
/// A tick is skipped while the previous request is still outstanding, so a slow
/// backend never accumulates requests. Requests already sent when playback stops
/// still complete and are applied.
#[derive(Clone)]
pub struct PlaybackScheduler {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("interval", &self.shared.interval)
            .field("steps", &self.shared.steps)
            .field("running", &self.is_running())
            .finish()
    }
}

impl PlaybackScheduler {
    pub fn new(
        bus: EventBus,
        sandbox: SandboxModel,
        backend: Arc<dyn SimulationBackend>,
        interval: Duration,
        steps: u32,
        on_error: ErrorHandler,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                bus,
                sandbox,
                backend,
                interval,
                steps,
                in_flight: AtomicBool::new(false),
                on_error,
                ticker: Mutex::new(Ticker::default()),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().handle.is_some()
    }

    /// Must be called from within a Tokio runtime. No-op while running.
    pub fn start(&self) {
        {
            let mut ticker = self.shared.lock();
            if ticker.handle.is_some() {
                return;
            }
            ticker.generation += 1;
            let generation = ticker.generation;
            ticker.handle = Some(tokio::spawn(run(Arc::clone(&self.shared), generation)));
        }
        tracing::debug!(interval_ms = self.shared.interval.as_millis() as u64, "playback started");
        self.shared
            .bus
            .publish(Signal::Playback(PlaybackStatus { running: true }));
    }

    /// Cancels the timer before returning. No-op while stopped.
    pub fn stop(&self) {
        {
            let Some(handle) = self.shared.lock().handle.take() else {
                return;
            };
            handle.abort();
        }
        tracing::debug!("playback stopped");
        self.shared
            .bus
            .publish(Signal::Playback(PlaybackStatus { running: false }));
    }

    /// Returns whether playback is running afterwards.
    pub fn toggle(&self) -> bool {
        if self.is_running() {
            self.stop();
            false
        } else {
            self.start();
            true
        }
    }
}

async fn run(shared: Arc<Shared>, generation: u64) {
    // Like a browser interval: the first tick is one period out, not immediate.
    let mut ticks = tokio::time::interval_at(Instant::now() + shared.interval, shared.interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticks.tick().await;
        shared.fire(generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ReplayBackend;
    use crate::error::BackendError;
    use crate::events::Subscription;
    use async_trait::async_trait;
    use botscope_protocol::{Entity, Snapshot, WorldConfig};
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct Counting {
        calls: AtomicU32,
        hang: bool,
        fail: bool,
    }

    #[async_trait]
    impl SimulationBackend for Counting {
        async fn create_sandbox(&self, _world: &WorldConfig) -> Result<Snapshot, BackendError> {
            Ok(Snapshot::new(vec![Entity::master("m")]))
        }

        async fn advance(&self, steps: u32) -> Result<Snapshot, BackendError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(BackendError::Status {
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(Snapshot::new(vec![
                Entity::master("m"),
                Entity::new(format!("turn-{n}-by-{steps}")),
            ]))
        }

        async fn destroy_sandboxes(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn scheduler(backend: Arc<dyn SimulationBackend>, bus: &EventBus) -> PlaybackScheduler {
        let sandbox = SandboxModel::new(bus.clone());
        PlaybackScheduler::new(
            bus.clone(),
            sandbox,
            backend,
            DEFAULT_INTERVAL,
            DEFAULT_STEPS_PER_TICK,
            log_errors(),
        )
    }

    fn playback_log(bus: &EventBus) -> (Arc<Mutex<Vec<bool>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = bus.subscribe(move |s| {
            if let Signal::Playback(p) = s {
                sink.lock().unwrap().push(p.running);
            }
        });
        (seen, sub)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_at_interval_and_stops_cleanly() {
        let backend = Arc::new(Counting::default());
        let bus = EventBus::new();
        let playback = scheduler(backend.clone(), &bus);

        playback.start();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);

        playback.stop();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_install_snapshots() {
        let backend = Arc::new(Counting::default());
        let bus = EventBus::new();
        let sandbox = SandboxModel::new(bus.clone());
        let playback = PlaybackScheduler::new(
            bus.clone(),
            sandbox.clone(),
            backend.clone(),
            DEFAULT_INTERVAL,
            DEFAULT_STEPS_PER_TICK,
            log_errors(),
        );

        playback.start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        playback.stop();

        let state = sandbox.state().expect("state installed");
        assert_eq!(state.entities[1].id, "turn-1-by-2");
        assert_eq!(sandbox.selected_entity().unwrap().id, "m");
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_are_idempotent() {
        let bus = EventBus::new();
        let (seen, _sub) = playback_log(&bus);
        let playback = scheduler(Arc::new(Counting::default()), &bus);

        playback.stop();
        assert!(seen.lock().unwrap().is_empty());

        playback.start();
        playback.start();
        assert!(playback.is_running());
        playback.stop();
        playback.stop();
        assert!(!playback.is_running());

        assert_eq!(*seen.lock().unwrap(), [true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_flips_state() {
        let bus = EventBus::new();
        let (seen, _sub) = playback_log(&bus);
        let playback = scheduler(Arc::new(Counting::default()), &bus);

        assert!(playback.toggle());
        assert!(!playback.toggle());
        assert_eq!(*seen.lock().unwrap(), [true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn outstanding_request_skips_ticks() {
        let backend = Arc::new(Counting {
            hang: true,
            ..Counting::default()
        });
        let bus = EventBus::new();
        let playback = scheduler(backend.clone(), &bus);

        playback.start();
        tokio::time::sleep(Duration::from_millis(550)).await;
        playback.stop();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_reach_the_handler_and_playback_continues() {
        let backend = Arc::new(Counting {
            fail: true,
            ..Counting::default()
        });
        let bus = EventBus::new();
        let errors = Arc::new(AtomicU32::new(0));
        let on_error: ErrorHandler = {
            let errors = Arc::clone(&errors);
            Arc::new(move |err: &AdvanceError| {
                assert!(matches!(err, AdvanceError::Backend(BackendError::Status { status: 500, .. })));
                errors.fetch_add(1, Ordering::SeqCst);
            })
        };
        let playback = PlaybackScheduler::new(
            bus.clone(),
            SandboxModel::new(bus.clone()),
            backend.clone(),
            DEFAULT_INTERVAL,
            DEFAULT_STEPS_PER_TICK,
            on_error,
        );

        playback.start();
        tokio::time::sleep(Duration::from_millis(350)).await;
        playback.stop();
        assert_eq!(errors.load(Ordering::SeqCst), 3);
        assert!(!playback.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_ticker_cannot_fire_after_stop() {
        let backend = Arc::new(Counting::default());
        let bus = EventBus::new();
        let playback = scheduler(backend.clone(), &bus);

        playback.start();
        let first = playback.shared.lock().generation;
        playback.stop();
        // A ticker that woke just before the abort lands here.
        assert!(!playback.shared.fire(first));

        playback.start();
        assert!(!playback.shared.fire(first));
        assert!(playback.shared.fire(first + 1));
        playback.stop();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn manual_advance_installs_state() {
        let bus = EventBus::new();
        let sandbox = SandboxModel::new(bus);
        let backend = ReplayBackend::new(vec![
            Snapshot::new(vec![Entity::master("a")]),
            Snapshot::new(vec![Entity::master("b")]),
        ]);
        backend.create_sandbox(&WorldConfig::default()).await.unwrap();

        advance_sandbox(&backend, &sandbox, 1).await.unwrap();
        assert_eq!(sandbox.selected_entity().unwrap().id, "b");
    }
}
