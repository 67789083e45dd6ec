//! Concurrent audit of a whole inventory.
//!
//! The NTP baseline and the run timestamp are fixed first. Devices are then
//! dispatched one tokio task each, with a semaphore bounding how many are
//! in flight. A device can only ever affect its own [`RunResult`].

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use log::{error, info, warn};
use secrecy::ExposeSecret;
use tokio::sync::Semaphore;

use crate::backup::{BackupWriter, RunTimestamp};
use crate::config::AuditConfig;
use crate::driver::{Driver, DriverBuilder, GenericDriver};
use crate::error::{DeviceError, Result};
use crate::extract::Extractor;
use crate::inventory::DeviceDescriptor;
use crate::ntp::{ConfigBaseline, NtpProbe, NtpProber};
use crate::platform::PlatformRegistry;
use crate::report::{DeviceFailure, RunResult, Stage};
use crate::session::{DeviceSession, RunContext, SessionState};

/// Creates an unopened driver for a device.
pub trait Connector: Send + Sync + 'static {
    type Driver: Driver + 'static;

    fn connect(&self, device: &DeviceDescriptor) -> Result<Self::Driver>;
}

/// Builds SSH drivers from the platform registry.
pub struct SshConnector {
    registry: PlatformRegistry,
    config: AuditConfig,
}

impl SshConnector {
    pub fn new(registry: PlatformRegistry, config: AuditConfig) -> Self {
        Self { registry, config }
    }
}

impl Connector for SshConnector {
    type Driver = GenericDriver;

    fn connect(&self, device: &DeviceDescriptor) -> Result<GenericDriver> {
        let mut builder = DriverBuilder::new(device.address.as_str())
            .port(device.port)
            .username(device.username.as_str())
            .password(device.password.expose_secret())
            .platform(device.device_type.as_str())
            .connect_timeout(self.config.connect_timeout())
            .command_timeout(self.config.command_timeout())
            .host_key_verification(self.config.host_key_verification);

        if let Some(secret) = &device.secret {
            builder = builder.enable_secret(secret.expose_secret());
        }
        if let Some(path) = &self.config.known_hosts_path {
            builder = builder.known_hosts_path(path);
        }

        builder.build(&self.registry)
    }
}

/// Stops a run from dispatching further devices.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel on the first interrupt from `next_interrupt`, then wait for a
    /// second one. True when the second interrupt arrived and the caller
    /// should stop waiting for in-flight devices.
    pub async fn cancel_on_interrupt<F, Fut>(&self, mut next_interrupt: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<()>>,
    {
        if next_interrupt().await.is_err() {
            return false;
        }
        warn!("interrupted: no new devices will be started, interrupt again to quit");
        self.cancel();

        next_interrupt().await.is_ok()
    }
}

/// Runs the audit over an inventory with a bounded worker pool.
pub struct FleetOrchestrator<C: Connector> {
    connector: Arc<C>,
    extractor: Extractor,
    writer: BackupWriter,
    config: AuditConfig,
    cancel: CancelHandle,
}

impl<C: Connector> FleetOrchestrator<C> {
    pub fn new(connector: C, extractor: Extractor, writer: BackupWriter, config: AuditConfig) -> Self {
        Self {
            connector: Arc::new(connector),
            extractor,
            writer,
            config,
            cancel: CancelHandle::default(),
        }
    }

    /// Handle that stops dispatching; devices already started still finish.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Probe the configured NTP candidates, then audit every device.
    pub async fn run(&self, inventory: Vec<DeviceDescriptor>) -> Vec<RunResult> {
        let prober = NtpProber::new(self.config.probe_timeout()).with_port(self.config.ntp_port);
        self.run_with_prober(inventory, &prober).await
    }

    /// [`run`](Self::run) with a caller-supplied NTP probe.
    pub async fn run_with_prober<P: NtpProbe>(
        &self,
        inventory: Vec<DeviceDescriptor>,
        prober: &P,
    ) -> Vec<RunResult> {
        let baseline =
            ConfigBaseline::build(&self.config.timezone, &self.config.ntp_candidates, prober).await;
        let context = RunContext {
            baseline,
            extractor: self.extractor.clone(),
            writer: self.writer.clone(),
            timestamp: RunTimestamp::now(),
        };
        self.dispatch(inventory, Arc::new(context)).await
    }

    /// Audit every device against an already-built context.
    ///
    /// Results come back in inventory order.
    pub async fn dispatch(
        &self,
        inventory: Vec<DeviceDescriptor>,
        context: Arc<RunContext>,
    ) -> Vec<RunResult> {
        info!(
            "auditing {} devices, {} at a time (run {})",
            inventory.len(),
            self.config.concurrency,
            context.timestamp
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut addresses = Vec::with_capacity(inventory.len());
        let mut handles = Vec::with_capacity(inventory.len());

        for device in inventory {
            addresses.push(device.address.clone());

            let sem = Arc::clone(&semaphore);
            let connector = Arc::clone(&self.connector);
            let context = Arc::clone(&context);
            let cancel = self.cancel.clone();
            handles.push(tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return not_dispatched(&device.address, "worker pool closed");
                };
                if cancel.is_cancelled() {
                    return not_dispatched(&device.address, "cancelled before start");
                }
                audit_device(connector.as_ref(), &device, &context).await
            }));
        }

        let results: Vec<RunResult> = join_all(handles)
            .await
            .into_iter()
            .zip(addresses)
            .map(|(joined, address)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!("{}: device task aborted: {}", address, e);
                    not_dispatched(&address, &format!("device task aborted: {e}"))
                }
            })
            .collect();

        let failed = results.iter().filter(|r| r.is_failed()).count();
        info!("run complete: {} devices, {} failed", results.len(), failed);
        results
    }
}

async fn audit_device<C: Connector>(
    connector: &C,
    device: &DeviceDescriptor,
    context: &RunContext,
) -> RunResult {
    match connector.connect(device) {
        Ok(driver) => DeviceSession::new(driver, device, context).run().await,
        Err(e) => {
            warn!("{}: cannot build session: {}", device.address, e);
            RunResult::Failed(DeviceFailure {
                address: device.address.clone(),
                hostname: None,
                stage: Stage::Connect,
                error: DeviceError::Connection(e),
                reached: SessionState::Disconnected,
            })
        }
    }
}

fn not_dispatched(address: &str, detail: &str) -> RunResult {
    RunResult::Failed(DeviceFailure {
        address: address.to_string(),
        hostname: None,
        stage: Stage::Dispatch,
        error: DeviceError::Dispatch {
            detail: detail.to_string(),
        },
        reached: SessionState::Disconnected,
    })
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::Error;
    use crate::error::PlatformError;

    fn device(address: &str, device_type: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            address: address.to_string(),
            port: 22,
            username: "admin".to_string(),
            password: SecretString::from("cisco".to_string()),
            secret: Some(SecretString::from("enable".to_string())),
            device_type: device_type.to_string(),
        }
    }

    #[test]
    fn test_ssh_connector_builds_known_platform() {
        let connector = SshConnector::new(PlatformRegistry::with_builtins(), AuditConfig::default());
        let driver = connector.connect(&device("10.0.0.1", "cisco_ios")).unwrap();
        assert_eq!(driver.platform().name, "cisco_ios");
        assert!(!driver.is_open());
    }

    #[test]
    fn test_ssh_connector_rejects_unsupported_type() {
        let connector = SshConnector::new(PlatformRegistry::with_builtins(), AuditConfig::default());
        let result = connector.connect(&device("10.0.0.1", "cisco_ios_telnet"));
        assert!(matches!(
            result,
            Err(Error::Platform(PlatformError::UnknownPlatform { .. }))
        ));
    }

    #[test]
    fn test_cancel_handle_is_shared() {
        let handle = CancelHandle::default();
        let clone = handle.clone();
        assert!(!handle.is_cancelled());
        clone.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_second_interrupt_forces_exit() {
        let handle = CancelHandle::default();
        let interrupts = Arc::new(tokio::sync::Notify::new());

        let watcher = tokio::spawn({
            let handle = handle.clone();
            let interrupts = Arc::clone(&interrupts);
            async move {
                handle
                    .cancel_on_interrupt(|| {
                        let interrupts = Arc::clone(&interrupts);
                        async move {
                            interrupts.notified().await;
                            Ok(())
                        }
                    })
                    .await
            }
        });

        interrupts.notify_one();
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !handle.is_cancelled() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(!watcher.is_finished());

        interrupts.notify_one();
        assert!(watcher.await.unwrap());
    }

    #[tokio::test]
    async fn test_interrupt_source_failure_does_not_cancel() {
        let handle = CancelHandle::default();
        let forced = handle
            .cancel_on_interrupt(|| async { Err(io::Error::other("no signal handler")) })
            .await;

        assert!(!forced);
        assert!(!handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_unsupported_type_fails_at_connect() {
        let orchestrator = FleetOrchestrator::new(
            SshConnector::new(PlatformRegistry::with_builtins(), AuditConfig::default()),
            Extractor::builtin().unwrap(),
            BackupWriter::new(std::env::temp_dir()),
            AuditConfig::default(),
        );
        let context = Arc::new(RunContext {
            baseline: ConfigBaseline::from_commands(vec!["clock timezone GMT 0 0".to_string()]),
            extractor: Extractor::builtin().unwrap(),
            writer: BackupWriter::new(std::env::temp_dir()),
            timestamp: RunTimestamp::now(),
        });

        let results = orchestrator
            .dispatch(vec![device("10.0.0.1", "juniper_junos")], context)
            .await;

        assert_eq!(results.len(), 1);
        match &results[0] {
            RunResult::Failed(failure) => {
                assert_eq!(failure.stage, Stage::Connect);
                assert!(matches!(failure.error, DeviceError::Connection(_)));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
