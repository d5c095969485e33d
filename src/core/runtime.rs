//! Main runtime orchestration.
//!
//! The runtime wires the registry together and drives its background work:
//! - Start order: stores → lease manager → expiry sweeper
//! - Shutdown order: sweeper → final sweep

use crate::core::config::Config;
use crate::core::time::{Clock, SystemClock};
use crate::registry::LeaseManager;
use crate::store::MemoryStore;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Records evicted by one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired records evicted from the primary store.
    pub primary: usize,
    /// Expired records evicted from the washout mirror.
    pub washout: usize,
}

impl SweepReport {
    /// Total evictions across both stores.
    pub fn total(&self) -> usize {
        self.primary + self.washout
    }
}

/// Trellis runtime holding the registry and its stores.
pub struct Runtime {
    /// Configuration.
    config: Arc<Config>,

    /// Primary registry store.
    primary: Arc<MemoryStore>,

    /// Washout mirror store.
    washout: Arc<MemoryStore>,

    /// Registry operations over both stores.
    registry: Arc<LeaseManager>,

    /// Whether the sweeper is running.
    running: Arc<AtomicBool>,

    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,

    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,

    /// Sweeper task handle.
    sweeper: Option<JoinHandle<()>>,
}

impl Runtime {
    /// Create a runtime reading wall-clock time.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a runtime on an explicit clock.
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let primary = Arc::new(MemoryStore::new(clock.clone()));
        let washout = Arc::new(MemoryStore::new(clock.clone()));
        let registry = Arc::new(LeaseManager::new(
            config.registry.clone(),
            primary.clone(),
            washout.clone(),
            clock,
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            primary,
            washout,
            registry,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            shutdown_rx,
            sweeper: None,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a handle to the registry.
    pub fn registry(&self) -> Arc<LeaseManager> {
        self.registry.clone()
    }

    /// Get the primary store.
    pub fn primary_store(&self) -> &Arc<MemoryStore> {
        &self.primary
    }

    /// Get the washout mirror store.
    pub fn washout_store(&self) -> &Arc<MemoryStore> {
        &self.washout
    }

    /// Check if the sweeper is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Get a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Evict expired records from both stores once.
    pub fn sweep_once(&self) -> SweepReport {
        sweep(&self.primary, &self.washout)
    }

    /// Start the background expiry sweeper.
    pub fn start(&mut self) -> Result<()> {
        if self.sweeper.is_some() {
            anyhow::bail!("runtime already started");
        }

        let period = Duration::from_millis(self.config.store.sweep_period_ms);
        tracing::info!(
            default_ttl_ms = self.config.registry.default_ttl_ms,
            washout_period_ms = self.config.registry.washout_period_ms,
            sweep_period_ms = self.config.store.sweep_period_ms,
            "starting Trellis runtime"
        );

        let primary = self.primary.clone();
        let washout = self.washout.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();
        self.sweeper = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let report = sweep(&primary, &washout);
                        if report.total() > 0 {
                            tracing::debug!(
                                primary = report.primary,
                                washout = report.washout,
                                "evicted expired records"
                            );
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("expiry sweeper stopped");
        }));

        self.running.store(true, Ordering::Release);
        tracing::info!("Trellis runtime started");
        Ok(())
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&self) {
        tracing::info!("shutdown requested");
        let _ = self.shutdown_tx.send(true);
    }

    /// Run the runtime until SIGINT or a shutdown request.
    pub async fn run(&mut self) -> Result<()> {
        self.start()?;

        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("shutdown signal received (SIGINT)");
            }
            _ = async {
                while !*shutdown_rx.borrow() {
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
            } => {
                tracing::info!("shutdown requested by component");
            }
        }

        self.stop().await
    }

    /// Stop the sweeper and run a final sweep.
    pub async fn stop(&mut self) -> Result<()> {
        tracing::info!("stopping Trellis runtime");
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.sweeper.take() {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "expiry sweeper task panicked"),
                Err(_) => tracing::warn!("expiry sweeper stop timed out"),
            }
        }
        self.running.store(false, Ordering::Release);

        let report = self.sweep_once();
        tracing::info!(
            resident = self.primary.len(),
            evicted = report.total(),
            expired_total = self.primary.expired_total(),
            "Trellis runtime stopped"
        );
        Ok(())
    }
}

fn sweep(primary: &MemoryStore, washout: &MemoryStore) -> SweepReport {
    SweepReport {
        primary: primary.sweep(),
        washout: washout.sweep(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::{ManualClock, Timestamp};
    use crate::registry::ResourceKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_start_and_stop() {
        let mut runtime = Runtime::new(Config::default()).unwrap();
        assert!(!runtime.is_running());

        runtime.start().unwrap();
        assert!(runtime.is_running());
        assert!(runtime.start().is_err());

        runtime.stop().await.unwrap();
        assert!(!runtime.is_running());
        assert!(*runtime.shutdown_receiver().borrow());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = Config::default();
        config.registry.default_ttl_ms = 0;
        assert!(Runtime::new(config).is_err());
    }

    #[tokio::test]
    async fn test_sweep_evicts_from_both_stores() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_000)));
        let runtime = Runtime::with_clock(Config::default(), clock.clone()).unwrap();
        runtime
            .registry()
            .register(ResourceKind::Node, "n1", json!({"id": "n1"}))
            .await
            .unwrap();
        assert_eq!(runtime.sweep_once(), SweepReport::default());

        clock.advance(Duration::from_millis(12_000));
        assert_eq!(
            runtime.sweep_once(),
            SweepReport {
                primary: 1,
                washout: 0
            }
        );

        clock.advance(Duration::from_millis(30_000));
        assert_eq!(runtime.sweep_once().washout, 1);
        assert!(runtime.primary_store().is_empty());
        assert!(runtime.washout_store().is_empty());
    }
}
