use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    config::TickerConfig,
    event::{Event, EventListener, EventPayload},
};

use super::types::{
    FeatureError, FeatureResult, NativeFeature, NativeFeatureStatus, NativeFeatureType,
};

/// Sends a `PeriodicTime` event to its target every `tick_interval`.
pub struct Ticker {
    target: Arc<dyn EventListener>,
    status: Arc<RwLock<NativeFeatureStatus>>,
    running: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    config: TickerConfig,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Ticker {
    pub fn new(target: Arc<dyn EventListener>, config: TickerConfig) -> FeatureResult<Self> {
        if config.tick_interval.is_zero() {
            return Err(FeatureError::InvalidConfig {
                feature: NativeFeatureType::Ticker,
                message: "tick interval must be greater than 0".to_string(),
            });
        }
        Ok(Self {
            target,
            status: Arc::new(RwLock::new(NativeFeatureStatus::Inactive)),
            running: Arc::new(AtomicBool::new(false)),
            ticks: Arc::new(AtomicU64::new(0)),
            config,
            task_handle: Mutex::new(None),
        })
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NativeFeature for Ticker {
    fn feature_type(&self) -> NativeFeatureType {
        NativeFeatureType::Ticker
    }

    async fn status(&self) -> NativeFeatureStatus {
        self.status.read().await.clone()
    }

    async fn start(&self) -> FeatureResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Ticker already running");
            return Ok(());
        }
        info!(interval = ?self.config.tick_interval, "Ticker started");
        *self.status.write().await = NativeFeatureStatus::Active;

        let running = self.running.clone();
        let ticks = self.ticks.clone();
        let target = self.target.clone();
        let mut interval_timer = tokio::time::interval(self.config.tick_interval);
        let handle = tokio::spawn(async move {
            // the first tick of a tokio interval completes immediately
            interval_timer.tick().await;
            while running.load(Ordering::SeqCst) {
                interval_timer.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let tick = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                target.on(&Event::new(EventPayload::PeriodicTime { tick }));
            }
        });
        *self.task_handle.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> FeatureResult<()> {
        debug!("Ticker stopping");
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task_handle.lock().await.take() {
            handle.abort();
        }
        *self.status.write().await = NativeFeatureStatus::Inactive;
        Ok(())
    }
}
