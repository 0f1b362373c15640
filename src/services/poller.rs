//! Polling periódico de las colecciones
//!
//! Un loop por colección, cada uno con su propio intervalo y sin coordinarse
//! con los demás. Los loops terminan cuando se llama a `shutdown()` o cuando
//! el `PollerHandle` se destruye; un request en vuelo no se cancela.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::environment::EnvironmentConfig;
use crate::services::dispatch_coordinator::DispatchCoordinator;
use crate::services::driver_portal::DriverPortal;

pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Default for PollerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PollerHandle {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Lanzar un loop que ejecuta `task` cada `period` (el primer tick es inmediato)
    pub fn every<F, Fut>(mut self, name: &'static str, period: Duration, task: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut stop = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            log::debug!("🔄 Polling de {} cada {:?}", name, period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => task().await,
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            log::debug!("🛑 Polling de {} detenido", name);
        });
        self.tasks.push(handle);
        self
    }

    /// Jobs, vehículos y conductores del panel de despacho
    pub fn for_dispatch(coordinator: Arc<DispatchCoordinator>, config: &EnvironmentConfig) -> Self {
        let jobs = coordinator.clone();
        let vehicles = coordinator.clone();
        let drivers = coordinator;

        Self::new()
            .every("jobs", config.jobs_poll_interval(), move || {
                let coordinator = jobs.clone();
                async move {
                    coordinator.refresh_jobs().await;
                }
            })
            .every("vehicles", config.vehicles_poll_interval(), move || {
                let coordinator = vehicles.clone();
                async move {
                    coordinator.refresh_vehicles().await;
                }
            })
            .every("drivers", config.drivers_poll_interval(), move || {
                let coordinator = drivers.clone();
                async move {
                    coordinator.refresh_drivers().await;
                }
            })
    }

    /// Perfil y job activo del portal del conductor
    pub fn for_portal(portal: Arc<DriverPortal>, period: Duration) -> Self {
        Self::new().every("portal", period, move || {
            let portal = portal.clone();
            async move {
                portal.load().await;
            }
        })
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Detener los loops y esperar a que terminen
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                log::warn!("⚠️ Loop de polling terminó con error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_loop_ticks_until_shutdown() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let poller = PollerHandle::new().every("test", Duration::from_secs(3), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(7500)).await;
        poller.shutdown().await;
        let seen = ticks.load(Ordering::SeqCst);
        assert_eq!(seen, 3);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_polling() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let poller = PollerHandle::new().every("test", Duration::from_secs(1), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(poller.task_count(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(poller);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let seen = ticks.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }
}
