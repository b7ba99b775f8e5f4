//! Process-scoped worker: the check scheduler and the log rotator, each driven
//! by its own ticker and stopped through a shared cancellation token.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::alerts::{AlertDispatcher, Messenger};
use crate::clock::Clock;
use crate::config::WorkerConfig;
use crate::database::{CheckStore, StatePersister};
use crate::logs::{CheckLogger, LogRotator, LogStore, RotationReport};
use crate::monitoring::checker::Prober;
use crate::monitoring::pipeline::CheckPipeline;
use crate::monitoring::scheduler::{CycleReport, MonitoringScheduler};
use crate::sync::KeyedLocks;

/// A source of "run now" events
#[async_trait]
pub trait Ticker: Send {
    /// Resolve at the next tick
    async fn tick(&mut self);
}

/// Ticks immediately, then every `period`. Late ticks are delayed, not bunched.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Run `job` on every tick until `cancel` fires.
///
/// A job already running when `cancel` fires is allowed to finish.
pub async fn run_every<T, F, Fut>(mut ticker: T, cancel: CancellationToken, mut job: F)
where
    T: Ticker,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = ()> + Send,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = ticker.tick() => job().await,
        }
    }
}

/// Everything the worker talks to
pub struct Collaborators {
    pub store: Arc<dyn CheckStore>,
    pub logs: Arc<dyn LogStore>,
    pub messenger: Arc<dyn Messenger>,
    pub prober: Arc<dyn Prober>,
    pub clock: Arc<dyn Clock>,
}

/// The health-check worker
pub struct WorkerService {
    scheduler: Arc<MonitoringScheduler>,
    rotator: Arc<LogRotator>,
    check_interval: Duration,
    rotation_interval: Duration,
}

impl WorkerService {
    pub fn new(config: &WorkerConfig, collaborators: Collaborators) -> Self {
        let Collaborators { store, logs, messenger, prober, clock } = collaborators;

        // Appends and rotations of the same log share a lock.
        let log_locks = Arc::new(KeyedLocks::new());

        let pipeline = CheckPipeline::new(
            prober,
            StatePersister::new(Arc::clone(&store)),
            AlertDispatcher::new(messenger),
            CheckLogger::new(Arc::clone(&logs), Arc::clone(&log_locks)),
            Arc::clone(&clock),
        );

        Self {
            scheduler: Arc::new(MonitoringScheduler::new(
                store,
                Arc::new(pipeline),
                config.max_concurrent_probes,
            )),
            rotator: Arc::new(LogRotator::new(logs, log_locks, clock)),
            check_interval: Duration::from_secs(config.check_interval_seconds.max(1)),
            rotation_interval: Duration::from_secs(config.rotation_interval_seconds.max(1)),
        }
    }

    /// Start both loops on interval tickers
    pub fn start(&self) -> WorkerHandle {
        self.start_with(
            IntervalTicker::new(self.check_interval),
            IntervalTicker::new(self.rotation_interval),
        )
    }

    /// Start both loops on the given tickers
    pub fn start_with<C, R>(&self, check_ticker: C, rotation_ticker: R) -> WorkerHandle
    where
        C: Ticker + 'static,
        R: Ticker + 'static,
    {
        let cancel = CancellationToken::new();
        info!("Background workers are running");

        let scheduler = Arc::clone(&self.scheduler);
        let checks = tokio::spawn(run_every(check_ticker, cancel.clone(), move || {
            let scheduler = Arc::clone(&scheduler);
            async move {
                if let Err(e) = scheduler.run_cycle().await {
                    error!("Could not list checks, skipping this cycle: {}", e);
                }
            }
        }));

        let rotator = Arc::clone(&self.rotator);
        let rotation = tokio::spawn(run_every(rotation_ticker, cancel.clone(), move || {
            let rotator = Arc::clone(&rotator);
            async move {
                rotator.run_cycle().await;
            }
        }));

        WorkerHandle {
            cancel,
            tasks: vec![checks, rotation],
            scheduler: Arc::clone(&self.scheduler),
        }
    }

    /// One check cycle and one rotation, waiting for every pipeline
    pub async fn run_once(&self) -> (Option<CycleReport>, RotationReport) {
        let cycle = match self.scheduler.run_cycle().await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Could not list checks: {}", e);
                None
            }
        };
        self.scheduler.wait_idle().await;

        let rotation = self.rotator.run_cycle().await;
        (cycle, rotation)
    }
}

/// Running worker
pub struct WorkerHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    scheduler: Arc<MonitoringScheduler>,
}

impl WorkerHandle {
    /// Token that stops the worker when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the pipelines spawned so far
    pub async fn wait_idle(&self) {
        self.scheduler.wait_idle().await;
    }

    /// Stop ticking, then wait for in-flight pipelines
    pub async fn stop(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Worker loop ended abnormally: {}", e);
            }
        }
        self.scheduler.wait_idle().await;
        info!("Background workers stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::CHECKS;
    use crate::monitoring::types::CheckOutcome;
    use crate::testing::{Fakes, ManualTicker, ScriptedProber};
    use serde_json::json;

    fn config() -> WorkerConfig {
        WorkerConfig {
            check_interval_seconds: 60,
            rotation_interval_seconds: 86_400,
            max_concurrent_probes: 4,
        }
    }

    fn raw(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "user_phone": "5551234567",
            "protocol": "http",
            "url": "example.com",
            "method": "get",
            "success_codes": [200],
            "timeout_seconds": 3,
            "state": "down"
        })
    }

    fn service(fakes: &Fakes) -> WorkerService {
        WorkerService::new(
            &config(),
            Collaborators {
                store: fakes.store.clone(),
                logs: fakes.logs.clone(),
                messenger: fakes.messenger.clone(),
                prober: fakes.prober.clone(),
                clock: fakes.clock.clone(),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticker_first_tick_is_immediate() {
        let mut ticker = IntervalTicker::new(Duration::from_secs(60));
        let start = tokio::time::Instant::now();

        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_checks_run_every_interval_until_stopped() {
        let fakes = Fakes::new(ScriptedProber::new(CheckOutcome::response(200)), 1_000);
        fakes.store.insert(CHECKS, "abcdefghij0123456789", raw("abcdefghij0123456789"));
        let worker = service(&fakes);

        let handle = worker.start();
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(fakes.prober.calls(), 2);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fakes.prober.calls(), 2);
    }

    #[tokio::test]
    async fn test_manual_ticks_drive_cycles() {
        let fakes = Fakes::new(ScriptedProber::new(CheckOutcome::response(200)), 1_000);
        fakes.store.insert(CHECKS, "abcdefghij0123456789", raw("abcdefghij0123456789"));
        let worker = service(&fakes);

        let (check_ticker, check_ticks) = ManualTicker::new();
        let (rotation_ticker, _rotation_ticks) = ManualTicker::new();
        let handle = worker.start_with(check_ticker, rotation_ticker);

        for expected in 1..=3 {
            check_ticks.send(()).unwrap();
            while fakes.prober.calls() < expected {
                tokio::task::yield_now().await;
            }
            handle.wait_idle().await;
        }

        handle.stop().await;
        assert_eq!(fakes.prober.calls(), 3);
        assert!(fakes.logs.active("abcdefghij0123456789").is_some());
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_pipelines() {
        let fakes = Fakes::new(
            ScriptedProber::with_delay(CheckOutcome::response(200), Duration::from_millis(50)),
            1_000,
        );
        fakes.store.insert(CHECKS, "abcdefghij0123456789", raw("abcdefghij0123456789"));
        let worker = service(&fakes);

        let (check_ticker, check_ticks) = ManualTicker::new();
        let (rotation_ticker, _rotation_ticks) = ManualTicker::new();
        let handle = worker.start_with(check_ticker, rotation_ticker);

        check_ticks.send(()).unwrap();
        while fakes.prober.calls() == 0 {
            tokio::task::yield_now().await;
        }
        handle.stop().await;

        let stored = fakes.store.get(CHECKS, "abcdefghij0123456789").unwrap();
        assert_eq!(stored["state"], "up");
        assert_eq!(stored["last_check"], 1_000);
    }

    #[tokio::test]
    async fn test_rotation_ticks_independently() {
        let fakes = Fakes::new(ScriptedProber::new(CheckOutcome::response(200)), 5);
        fakes.logs.append("abcdefghij0123456789", "line").await.unwrap();
        let worker = service(&fakes);

        let (check_ticker, _check_ticks) = ManualTicker::new();
        let (rotation_ticker, rotation_ticks) = ManualTicker::new();
        let handle = worker.start_with(check_ticker, rotation_ticker);

        rotation_ticks.send(()).unwrap();
        while fakes.logs.active("abcdefghij0123456789").as_deref() != Some("") {
            tokio::task::yield_now().await;
        }
        handle.stop().await;

        assert_eq!(fakes.prober.calls(), 0);
        assert_eq!(fakes.logs.decompress("abcdefghij0123456789-5").await.unwrap(), "line\n");
    }

    #[tokio::test]
    async fn test_run_once_waits_for_everything() {
        let fakes = Fakes::new(ScriptedProber::new(CheckOutcome::timed_out()), 9);
        fakes.store.insert(CHECKS, "abcdefghij0123456789", raw("abcdefghij0123456789"));
        let worker = service(&fakes);

        let (cycle, rotation) = worker.run_once().await;

        assert_eq!(cycle.unwrap().launched, 1);
        assert_eq!(rotation.rotated, vec!["abcdefghij0123456789"]);
        assert_eq!(fakes.logs.active("abcdefghij0123456789").as_deref(), Some(""));
        let archived = fakes.logs.decompress("abcdefghij0123456789-9").await.unwrap();
        assert_eq!(archived.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_list_failure_does_not_stop_the_worker() {
        let fakes = Fakes::new(ScriptedProber::new(CheckOutcome::response(200)), 1);
        fakes.store.insert(CHECKS, "abcdefghij0123456789", raw("abcdefghij0123456789"));
        fakes.store.fail_list(true);
        let worker = service(&fakes);

        let (check_ticker, check_ticks) = ManualTicker::new();
        let (rotation_ticker, _rotation_ticks) = ManualTicker::new();
        let handle = worker.start_with(check_ticker, rotation_ticker);

        check_ticks.send(()).unwrap();
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert_eq!(fakes.prober.calls(), 0);

        fakes.store.fail_list(false);
        check_ticks.send(()).unwrap();
        while fakes.prober.calls() == 0 {
            tokio::task::yield_now().await;
        }
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_intervals_fall_back_to_one_second() {
        let fakes = Fakes::new(ScriptedProber::new(CheckOutcome::response(200)), 1_000);
        fakes.store.insert(CHECKS, "abcdefghij0123456789", raw("abcdefghij0123456789"));
        let config = WorkerConfig {
            check_interval_seconds: 0,
            rotation_interval_seconds: 0,
            max_concurrent_probes: 4,
        };
        let worker = WorkerService::new(
            &config,
            Collaborators {
                store: fakes.store.clone(),
                logs: fakes.logs.clone(),
                messenger: fakes.messenger.clone(),
                prober: fakes.prober.clone(),
                clock: fakes.clock.clone(),
            },
        );

        let handle = worker.start();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(fakes.prober.calls(), 2);

        handle.stop().await;
    }
}
