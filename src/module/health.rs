//! TPS-driven health monitoring
//!
//! The manager only reacts to health transitions; something has to sample the
//! host's tick rate and decide when a transition happened. [`HealthMonitor`]
//! polls a [`TpsSource`] on a tokio interval, applies hysteresis between the
//! two configured thresholds and calls
//! [`ModuleManager::notify_health_change`] when the verdict flips.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::HealthConfig;
use crate::module::manager::ModuleManager;
use crate::module::traits::ModuleError;
use crate::utils::log_error_async;

/// Health thresholds with hysteresis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthThresholds {
    /// A healthy host turns unhealthy below this TPS
    pub unhealthy_below_tps: f64,
    /// An unhealthy host recovers at or above this TPS
    pub recovered_at_tps: f64,
}

impl HealthThresholds {
    pub fn from_config(config: &HealthConfig) -> Self {
        Self {
            unhealthy_below_tps: config.unhealthy_below_tps,
            recovered_at_tps: config.recovered_at_tps,
        }
    }

    /// Health verdict for `tps` given the current verdict.
    ///
    /// Between the two thresholds the current verdict is kept, so a TPS
    /// hovering around one threshold does not flap.
    pub fn evaluate(&self, currently_healthy: bool, tps: f64) -> bool {
        if currently_healthy {
            tps >= self.unhealthy_below_tps
        } else {
            tps >= self.recovered_at_tps
        }
    }
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self::from_config(&HealthConfig::default())
    }
}

/// Source of tick-rate samples
#[async_trait]
pub trait TpsSource: Send + Sync {
    /// Sample the current ticks per second
    async fn sample_tps(&self) -> Result<f64, ModuleError>;
}

/// Periodic TPS sampler feeding the module manager
pub struct HealthMonitor {
    manager: Arc<ModuleManager>,
    source: Arc<dyn TpsSource>,
    thresholds: HealthThresholds,
    interval: Duration,
}

impl HealthMonitor {
    /// Create a monitor using the manager's configured thresholds and interval
    pub fn new(manager: Arc<ModuleManager>, source: Arc<dyn TpsSource>) -> Self {
        let health = &manager.config().health;
        let thresholds = HealthThresholds::from_config(health);
        let interval = Duration::from_millis(health.sample_interval_ms.max(1));
        Self {
            manager,
            source,
            thresholds,
            interval,
        }
    }

    /// Set sampling interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override thresholds
    pub fn with_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Apply one TPS sample. Returns `true` if the health flag flipped.
    ///
    /// Runs the module hooks on the calling thread.
    pub fn apply_sample(&self, tps: f64) -> bool {
        apply(&self.manager, &self.thresholds, tps)
    }

    /// Sample the source once and apply the result.
    ///
    /// A failed sample is logged and leaves the health flag untouched.
    pub async fn poll_once(&self) -> bool {
        let Some(tps) = log_error_async(|| self.source.sample_tps(), "TPS sampling failed").await
        else {
            return false;
        };

        if !tps.is_finite() {
            warn!(tps, "Ignoring non-finite TPS sample");
            return false;
        }
        debug!(tps, "TPS sample");

        // Module hooks are synchronous and may block
        let manager = Arc::clone(&self.manager);
        let thresholds = self.thresholds;
        match tokio::task::spawn_blocking(move || apply(&manager, &thresholds, tps)).await {
            Ok(flipped) => flipped,
            Err(e) => {
                warn!("Health notification task failed: {}", e);
                false
            }
        }
    }

    /// Sample until `shutdown` turns `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Starting health monitor");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Health monitor stopped");
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    ///
    /// Send `true` on the returned sender to stop the monitor.
    pub fn spawn(self) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(shutdown_rx));
        (handle, shutdown_tx)
    }
}

fn apply(manager: &ModuleManager, thresholds: &HealthThresholds, tps: f64) -> bool {
    manager.record_tps(tps);
    let healthy = thresholds.evaluate(manager.is_healthy(), tps);
    manager.notify_health_change(healthy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleSystemConfig;
    use crate::module::registry::discovery::StaticDiscovery;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedSource {
        samples: Mutex<VecDeque<f64>>,
        fallback: f64,
    }

    impl ScriptedSource {
        fn new(samples: &[f64], fallback: f64) -> Self {
            Self {
                samples: Mutex::new(samples.iter().copied().collect()),
                fallback,
            }
        }
    }

    #[async_trait]
    impl TpsSource for ScriptedSource {
        async fn sample_tps(&self) -> Result<f64, ModuleError> {
            Ok(self
                .samples
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.fallback))
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl TpsSource for BrokenSource {
        async fn sample_tps(&self) -> Result<f64, ModuleError> {
            Err(ModuleError::OperationError("tick counter unavailable".to_string()))
        }
    }

    fn manager() -> Arc<ModuleManager> {
        Arc::new(ModuleManager::new(
            StaticDiscovery::new(),
            ModuleSystemConfig::default(),
        ))
    }

    #[test]
    fn test_hysteresis() {
        let t = HealthThresholds::default();

        assert!(t.evaluate(true, 20.0));
        assert!(t.evaluate(true, 18.0));
        assert!(!t.evaluate(true, 17.9));

        // Between thresholds an unhealthy host stays unhealthy
        assert!(!t.evaluate(false, 19.0));
        assert!(t.evaluate(false, 19.5));
    }

    #[test]
    fn test_apply_sample_flips_once() {
        let monitor = HealthMonitor::new(manager(), Arc::new(BrokenSource));

        assert!(monitor.apply_sample(12.0));
        assert!(!monitor.apply_sample(11.0));
        assert!(!monitor.manager.is_healthy());
        assert_eq!(monitor.manager.current_tps(), 11.0);

        assert!(!monitor.apply_sample(19.0));
        assert!(monitor.apply_sample(20.0));
        assert!(monitor.manager.is_healthy());
    }

    #[tokio::test]
    async fn test_failed_sample_keeps_flag() {
        let monitor = HealthMonitor::new(manager(), Arc::new(BrokenSource));
        assert!(!monitor.poll_once().await);
        assert!(monitor.manager.is_healthy());
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let manager = manager();
        let source = Arc::new(ScriptedSource::new(&[20.0, 5.0], 5.0));
        let monitor = HealthMonitor::new(Arc::clone(&manager), source)
            .with_interval(Duration::from_millis(5));

        let (handle, shutdown) = monitor.spawn();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while manager.is_healthy() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!manager.is_healthy());

        shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
