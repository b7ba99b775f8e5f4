//! In-memory collaborators for tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::alerts::Messenger;
use crate::clock::Clock;
use crate::database::CheckStore;
use crate::error::{LogStoreError, MessagingError, StorageError};
use crate::logs::LogStore;
use crate::monitoring::checker::Prober;
use crate::monitoring::types::{CheckOutcome, CheckRecord};
use crate::service::Ticker;

fn io_error(message: &str) -> std::io::Error {
    std::io::Error::other(message.to_string())
}

#[derive(Default)]
pub struct MemoryCheckStore {
    records: Mutex<HashMap<(String, String), Value>>,
    fail_list: AtomicBool,
    fail_updates: AtomicBool,
    unreadable: Mutex<HashSet<String>>,
}

impl MemoryCheckStore {
    pub fn insert(&self, category: &str, id: &str, record: Value) {
        self.records.lock().unwrap().insert((category.to_string(), id.to_string()), record);
    }

    pub fn get(&self, category: &str, id: &str) -> Option<Value> {
        self.records.lock().unwrap().get(&(category.to_string(), id.to_string())).cloned()
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn make_unreadable(&self, id: &str) {
        self.unreadable.lock().unwrap().insert(id.to_string());
    }
}

#[async_trait]
impl CheckStore for MemoryCheckStore {
    async fn list(&self, category: &str) -> Result<Vec<String>, StorageError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(io_error("list failed").into());
        }
        let mut ids: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == category)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn read(&self, category: &str, id: &str) -> Result<Value, StorageError> {
        if self.unreadable.lock().unwrap().contains(id) {
            return Err(io_error("read failed").into());
        }
        self.get(category, id).ok_or_else(|| StorageError::NotFound {
            category: category.to_string(),
            id: id.to_string(),
        })
    }

    async fn update(&self, category: &str, id: &str, record: &Value) -> Result<(), StorageError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(io_error("update failed").into());
        }
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&(category.to_string(), id.to_string())) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                category: category.to_string(),
                id: id.to_string(),
            }),
        }
    }

    async fn create(&self, category: &str, id: &str, record: &Value) -> Result<(), StorageError> {
        let mut records = self.records.lock().unwrap();
        let key = (category.to_string(), id.to_string());
        if records.contains_key(&key) {
            return Err(StorageError::AlreadyExists {
                category: category.to_string(),
                id: id.to_string(),
            });
        }
        records.insert(key, record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLogStore {
    active: Mutex<HashMap<String, String>>,
    archives: Mutex<HashMap<String, String>>,
    fail_appends: AtomicBool,
    fail_compress: Mutex<HashSet<String>>,
}

impl MemoryLogStore {
    pub fn active(&self, id: &str) -> Option<String> {
        self.active.lock().unwrap().get(id).cloned()
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_compress_for(&self, id: &str) {
        self.fail_compress.lock().unwrap().insert(id.to_string());
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, id: &str, line: &str) -> Result<(), LogStoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(io_error("append failed").into());
        }
        let mut active = self.active.lock().unwrap();
        let log = active.entry(id.to_string()).or_default();
        log.push_str(line);
        log.push('\n');
        Ok(())
    }

    async fn list(&self, include_archived: bool) -> Result<Vec<String>, LogStoreError> {
        let mut names: Vec<_> = self.active.lock().unwrap().keys().cloned().collect();
        if include_archived {
            names.extend(self.archives.lock().unwrap().keys().cloned());
        }
        names.sort();
        Ok(names)
    }

    async fn compress(&self, id: &str, archive_id: &str) -> Result<(), LogStoreError> {
        if self.fail_compress.lock().unwrap().contains(id) {
            return Err(io_error("compress failed").into());
        }
        let contents = self.active(id).ok_or_else(|| io_error("no such log"))?;
        let mut archives = self.archives.lock().unwrap();
        if archives.contains_key(archive_id) {
            return Err(LogStoreError::ArchiveExists(archive_id.to_string()));
        }
        archives.insert(archive_id.to_string(), contents);
        Ok(())
    }

    async fn decompress(&self, archive_id: &str) -> Result<String, LogStoreError> {
        self.archives
            .lock()
            .unwrap()
            .get(archive_id)
            .cloned()
            .ok_or_else(|| io_error("no such archive").into())
    }

    async fn truncate(&self, id: &str) -> Result<(), LogStoreError> {
        match self.active.lock().unwrap().get_mut(id) {
            Some(log) => {
                log.clear();
                Ok(())
            }
            None => Err(io_error("no such log").into()),
        }
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingMessenger {
    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, phone: &str, message: &str) -> Result<(), MessagingError> {
        if self.fail {
            return Err(MessagingError::Rejected { status: 500, body: "down".to_string() });
        }
        self.sent.lock().unwrap().push((phone.to_string(), message.to_string()));
        Ok(())
    }
}

/// Returns a fixed outcome after an optional delay, counting calls
pub struct ScriptedProber {
    outcome: CheckOutcome,
    delay: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    peak_running: AtomicUsize,
}

impl ScriptedProber {
    pub fn new(outcome: CheckOutcome) -> Self {
        Self::with_delay(outcome, Duration::ZERO)
    }

    pub fn with_delay(outcome: CheckOutcome, delay: Duration) -> Self {
        Self {
            outcome,
            delay,
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            peak_running: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _check: &CheckRecord) -> CheckOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self { now: AtomicI64::new(now) }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Ticks once per message sent on its channel
pub struct ManualTicker {
    ticks: mpsc::UnboundedReceiver<()>,
}

impl ManualTicker {
    pub fn new() -> (Self, mpsc::UnboundedSender<()>) {
        let (tx, ticks) = mpsc::unbounded_channel();
        (Self { ticks }, tx)
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) {
        if self.ticks.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

/// Shared handles to every fake, for wiring a whole worker
pub struct Fakes {
    pub store: Arc<MemoryCheckStore>,
    pub logs: Arc<MemoryLogStore>,
    pub messenger: Arc<RecordingMessenger>,
    pub prober: Arc<ScriptedProber>,
    pub clock: Arc<FixedClock>,
}

impl Fakes {
    pub fn new(prober: ScriptedProber, now: i64) -> Self {
        Self {
            store: Arc::new(MemoryCheckStore::default()),
            logs: Arc::new(MemoryLogStore::default()),
            messenger: Arc::new(RecordingMessenger::default()),
            prober: Arc::new(prober),
            clock: Arc::new(FixedClock::new(now)),
        }
    }
}
