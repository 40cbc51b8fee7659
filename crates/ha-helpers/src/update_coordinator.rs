//! Data update coordinator
//!
//! One coordinator owns the polling of one remote data source. It runs the
//! fetch on an interval, keeps the latest successful result and publishes
//! every refresh outcome on a `watch` channel that entities subscribe to.
//!
//! Refreshes never overlap: scheduled ticks, requested refreshes and the
//! first refresh at setup all go through the same async mutex.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use ha_core::{HomeAssistantError, UpdateFailed};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// The fetch a coordinator performs on every refresh
#[async_trait]
pub trait DataUpdate: Send + Sync + 'static {
    type Data: Send + Sync + 'static;

    async fn update(&self) -> Result<Self::Data, UpdateFailed>;
}

/// What subscribers see after each refresh
#[derive(Debug)]
pub struct CoordinatorState<D> {
    /// Result of the last successful refresh
    pub data: Option<Arc<D>>,
    pub last_update_success: bool,
}

impl<D> Clone for CoordinatorState<D> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            last_update_success: self.last_update_success,
        }
    }
}

impl<D> CoordinatorState<D> {
    /// Data is present and the last refresh succeeded
    pub fn available(&self) -> bool {
        self.last_update_success && self.data.is_some()
    }
}

pub struct DataUpdateCoordinator<U: DataUpdate> {
    name: String,
    updater: U,
    update_interval_ms: AtomicU64,
    state: watch::Sender<CoordinatorState<U::Data>>,
    refresh_lock: Mutex<()>,
    rearm: Notify,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl<U: DataUpdate> DataUpdateCoordinator<U> {
    pub fn new(name: impl Into<String>, updater: U, update_interval: Duration) -> Self {
        let (state, _) = watch::channel(CoordinatorState {
            data: None,
            last_update_success: true,
        });
        Self {
            name: name.into(),
            updater,
            update_interval_ms: AtomicU64::new(duration_ms(update_interval)),
            state,
            refresh_lock: Mutex::new(()),
            rearm: Notify::new(),
            task: StdMutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fetch implementation this coordinator drives
    pub fn updater(&self) -> &U {
        &self.updater
    }

    /// Latest successful data, if any refresh succeeded yet
    pub fn data(&self) -> Option<Arc<U::Data>> {
        self.state.borrow().data.clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.state.borrow().last_update_success
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState<U::Data>> {
        self.state.subscribe()
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.load(Ordering::SeqCst))
    }

    /// Change the polling interval; the running timer restarts with it
    pub fn set_update_interval(&self, interval: Duration) {
        self.update_interval_ms
            .store(duration_ms(interval), Ordering::SeqCst);
        self.rearm.notify_one();
    }

    /// Fetch now and publish the outcome.
    ///
    /// On failure the previous data stays in place and subscribers are told
    /// the last update did not succeed.
    pub async fn refresh(&self) -> Result<(), UpdateFailed> {
        let _guard = self.refresh_lock.lock().await;
        let was_successful = self.last_update_success();

        match self.updater.update().await {
            Ok(data) => {
                if !was_successful {
                    info!("Fetching {} data recovered", self.name);
                }
                self.state.send_replace(CoordinatorState {
                    data: Some(Arc::new(data)),
                    last_update_success: true,
                });
                Ok(())
            }
            Err(err) => {
                if was_successful {
                    error!("Error fetching {} data: {}", self.name, err);
                } else {
                    debug!("Error fetching {} data: {}", self.name, err);
                }
                self.state.send_modify(|state| state.last_update_success = false);
                Err(err)
            }
        }
    }

    /// First refresh during config entry setup; failure means "not ready"
    pub async fn config_entry_first_refresh(&self) -> Result<(), HomeAssistantError> {
        self.refresh().await.map_err(HomeAssistantError::from)
    }

    /// Refresh right away and restart the interval timer
    pub async fn request_refresh(&self) {
        // failure is already logged and published
        let _ = self.refresh().await;
        self.rearm.notify_one();
    }

    /// Start the polling loop. Calling it again is a no-op.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut task) = self.task.lock() else {
            return;
        };
        if task.is_some() {
            return;
        }

        let coordinator = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(coordinator.update_interval()) => {}
                    _ = coordinator.rearm.notified() => continue,
                }
                // failure is already logged and published
                let _ = coordinator.refresh().await;
            }
        }));
        debug!(
            "Started {} polling every {:?}",
            self.name,
            self.update_interval()
        );
    }

    /// Stop the polling loop
    pub fn shutdown(&self) {
        if let Some(handle) = self.task.lock().ok().and_then(|mut t| t.take()) {
            handle.abort();
            debug!("Stopped {} polling", self.name);
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().map(|t| t.is_some()).unwrap_or(false)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Counts calls; fails while `failing` is set
    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
        failing: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl DataUpdate for Counter {
        type Data = usize;

        async fn update(&self) -> Result<usize, UpdateFailed> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing.load(Ordering::SeqCst) {
                Err(UpdateFailed::new("Error communicating with API: boom"))
            } else {
                Ok(n)
            }
        }
    }

    fn coordinator(interval: Duration) -> Arc<DataUpdateCoordinator<Counter>> {
        Arc::new(DataUpdateCoordinator::new(
            "test",
            Counter::default(),
            interval,
        ))
    }

    #[tokio::test]
    async fn test_refresh_publishes_data() {
        let coordinator = coordinator(Duration::from_secs(600));
        let mut rx = coordinator.subscribe();
        assert!(coordinator.data().is_none());

        coordinator.refresh().await.unwrap();
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.data.as_deref(), Some(&1));
        assert!(state.available());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_data() {
        let coordinator = coordinator(Duration::from_secs(600));
        coordinator.refresh().await.unwrap();

        coordinator.updater().failing.store(true, Ordering::SeqCst);
        let err = coordinator.refresh().await.unwrap_err();
        assert_eq!(err.to_string(), "Error communicating with API: boom");
        assert_eq!(coordinator.data().as_deref(), Some(&1));
        assert!(!coordinator.last_update_success());
        assert!(!coordinator.subscribe().borrow().available());

        coordinator.updater().failing.store(false, Ordering::SeqCst);
        coordinator.refresh().await.unwrap();
        assert_eq!(coordinator.data().as_deref(), Some(&3));
        assert!(coordinator.last_update_success());
    }

    #[tokio::test]
    async fn test_first_refresh_failure_is_not_ready() {
        let coordinator = coordinator(Duration::from_secs(600));
        coordinator.updater().failing.store(true, Ordering::SeqCst);
        let err = coordinator.config_entry_first_refresh().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(coordinator.data().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval_until_shutdown() {
        let coordinator = coordinator(Duration::from_secs(60));
        coordinator.start();
        coordinator.start();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(coordinator.updater().calls.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(coordinator.updater().calls.load(Ordering::SeqCst), 2);

        coordinator.shutdown();
        assert!(!coordinator.is_running());
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(coordinator.updater().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_interval_rearms_timer() {
        let coordinator = coordinator(Duration::from_secs(600));
        coordinator.start();
        tokio::time::sleep(Duration::from_secs(10)).await;

        coordinator.set_update_interval(Duration::from_secs(30));
        assert_eq!(coordinator.update_interval(), Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(coordinator.updater().calls.load(Ordering::SeqCst), 1);
        coordinator.shutdown();
    }

    #[tokio::test]
    async fn test_request_refresh_fetches_immediately() {
        let coordinator = coordinator(Duration::from_secs(600));
        coordinator.request_refresh().await;
        assert_eq!(coordinator.data().as_deref(), Some(&1));
    }
}
