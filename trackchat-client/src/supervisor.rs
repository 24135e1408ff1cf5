//! Session supervisor
//!
//! Runs the capture side: opens the source, feeds every notification
//! through the pipeline, watches health and reconnects with backoff.
//! Sole writer of the session state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use trackchat_protocol::{NoticeKind, RawBatch, SessionState, SystemNotice};

use crate::config::SessionConfig;
use crate::pipeline::CapturePipeline;
use crate::session::SessionStateWriter;
use crate::source::{ContentStream, EventSource, SourceHealth};

/// Exponential reconnect delays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: u32,
    pub max: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Delay before the given attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// Delays for every attempt, in order
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_attempts).map(move |attempt| self.delay_for(attempt))
    }
}

/// Health and reconnection tuning
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub health_interval: Duration,
    pub health_timeout: Duration,
    pub failure_threshold: u32,
    pub backoff: BackoffPolicy,
}

impl SupervisorSettings {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            health_interval: Duration::from_millis(config.health_interval_ms),
            health_timeout: Duration::from_millis(config.health_timeout_ms),
            failure_threshold: config.failure_threshold.max(1),
            backoff: BackoffPolicy {
                initial: Duration::from_millis(config.backoff_initial_ms),
                multiplier: config.backoff_multiplier,
                max: Duration::from_millis(config.backoff_max_ms),
                max_attempts: config.max_reconnect_attempts,
            },
        }
    }
}

/// Why a live session was abandoned
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionFault {
    #[error("notification stream ended")]
    StreamClosed,

    #[error("{failures} consecutive health checks failed ({reason})")]
    Unhealthy { failures: u32, reason: String },

    #[error("could not open session: {0}")]
    Open(String),
}

/// The session is gone for good
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalSessionLoss {
    #[error("session lost after {attempts} reconnection attempts")]
    Exhausted { attempts: u32 },

    /// Opening failed in a way another attempt cannot fix (bad credentials, bad selectors)
    #[error("session cannot be opened: {reason}")]
    Rejected { reason: String },
}

enum LiveEvent {
    Shutdown,
    Batch(Option<RawBatch>),
    HealthTick,
}

pub struct SessionSupervisor {
    source: Arc<dyn EventSource>,
    pipeline: CapturePipeline,
    state: SessionStateWriter,
    settings: SupervisorSettings,
    shutdown: CancellationToken,
}

impl SessionSupervisor {
    pub fn new(
        source: Arc<dyn EventSource>,
        pipeline: CapturePipeline,
        state: SessionStateWriter,
        settings: SupervisorSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            pipeline,
            state,
            settings,
            shutdown,
        }
    }

    /// Run on a background task
    pub fn spawn(self) -> JoinHandle<Result<(), FatalSessionLoss>> {
        tokio::spawn(self.run())
    }

    /// Supervise until shutdown (`Ok`) or until reconnection gives up
    pub async fn run(mut self) -> Result<(), FatalSessionLoss> {
        let shutdown = self.shutdown.clone();
        let source = self.source.clone();

        self.state.set(SessionState::Connecting);
        info!(source = %source.describe(), "Opening chat session");

        let mut stream = match cancellable(&shutdown, source.open()).await {
            None => return Ok(()),
            Some(Ok(stream)) => {
                self.state.set(SessionState::Live);
                self.announce(SystemNotice::new(
                    NoticeKind::Connected,
                    format!("Connected to {}", source.describe()),
                ))
                .await;
                stream
            }
            Some(Err(e)) if !e.is_retryable() => {
                error!(error = %e, "Initial connection rejected");
                return Err(self.reject(e.to_string()).await);
            }
            Some(Err(e)) => {
                warn!(error = %e, "Initial connection failed");
                match self.recover(SessionFault::Open(e.to_string())).await? {
                    Some(stream) => stream,
                    None => return Ok(()),
                }
            }
        };

        loop {
            let Some(fault) = self.run_live(&mut stream).await else {
                info!("Capture stopped");
                return Ok(());
            };

            stream = match self.recover(fault).await? {
                Some(stream) => stream,
                None => return Ok(()),
            };
        }
    }

    /// Pump notifications until a fault, or `None` on shutdown
    async fn run_live(&mut self, stream: &mut ContentStream) -> Option<SessionFault> {
        let shutdown = self.shutdown.clone();
        let mut health = tokio::time::interval(self.settings.health_interval);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        health.tick().await;

        let mut failures = 0u32;

        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => LiveEvent::Shutdown,
                batch = stream.recv() => LiveEvent::Batch(batch),
                _ = health.tick() => LiveEvent::HealthTick,
            };

            match event {
                LiveEvent::Shutdown => return None,
                LiveEvent::Batch(None) => {
                    warn!("Notification stream ended");
                    return Some(SessionFault::StreamClosed);
                }
                LiveEvent::Batch(Some(batch)) => {
                    if self.pipeline.ingest(batch).await.is_err() {
                        debug!("Display side gone, stopping capture");
                        return None;
                    }
                }
                LiveEvent::HealthTick => match self.check_health().await {
                    SourceHealth::Alive => failures = 0,
                    SourceHealth::Lost(reason) => {
                        failures += 1;
                        warn!(failures, reason = %reason, "Health check failed");
                        if failures >= self.settings.failure_threshold {
                            return Some(SessionFault::Unhealthy { failures, reason });
                        }
                    }
                },
            }
        }
    }

    async fn check_health(&self) -> SourceHealth {
        match tokio::time::timeout(self.settings.health_timeout, self.source.health()).await {
            Ok(health) => health,
            Err(_) => SourceHealth::Lost(format!(
                "no answer within {}ms",
                self.settings.health_timeout.as_millis()
            )),
        }
    }

    /// Reconnect with backoff
    ///
    /// `Ok(None)` means shutdown was requested while recovering.
    async fn recover(
        &mut self,
        fault: SessionFault,
    ) -> Result<Option<ContentStream>, FatalSessionLoss> {
        let shutdown = self.shutdown.clone();
        let source = self.source.clone();
        let policy = self.settings.backoff.clone();

        self.state.set(SessionState::Degraded);
        self.announce(SystemNotice::new(
            NoticeKind::Disconnected,
            format!("Connection lost: {}. Reconnecting...", fault),
        ))
        .await;

        for (index, delay) in policy.delays().enumerate() {
            let attempt = index as u32 + 1;
            info!(
                "Reconnection attempt {}/{}: waiting {}ms before trying",
                attempt,
                policy.max_attempts,
                delay.as_millis()
            );

            if cancellable(&shutdown, tokio::time::sleep(delay)).await.is_none() {
                return Ok(None);
            }

            match cancellable(&shutdown, source.open()).await {
                None => return Ok(None),
                Some(Ok(stream)) => {
                    info!("Reconnection successful on attempt {}", attempt);
                    self.state.set(SessionState::Live);
                    self.announce(SystemNotice::new(
                        NoticeKind::Reconnected { attempt },
                        format!("Reconnected (attempt {})", attempt),
                    ))
                    .await;
                    return Ok(Some(stream));
                }
                Some(Err(e)) if !e.is_retryable() => {
                    error!("Reconnection attempt {} rejected: {}", attempt, e);
                    return Err(self.reject(e.to_string()).await);
                }
                Some(Err(e)) => warn!("Reconnection attempt {} failed: {}", attempt, e),
            }
        }

        let attempts = policy.max_attempts;
        error!("All {} reconnection attempts exhausted", attempts);
        self.terminate(format!(
            "Disconnected after {} failed reconnection attempts. Restart trackchat to reconnect.",
            attempts
        ))
        .await;

        Err(FatalSessionLoss::Exhausted { attempts })
    }

    async fn reject(&mut self, reason: String) -> FatalSessionLoss {
        self.terminate(format!(
            "Cannot connect: {}. Fix the problem and restart trackchat.",
            reason
        ))
        .await;
        FatalSessionLoss::Rejected { reason }
    }

    /// Enter `Terminated` and stop capture for good
    async fn terminate(&mut self, text: String) {
        self.state.set(SessionState::Terminated);
        self.announce(SystemNotice::new(NoticeKind::Terminated, text))
            .await;
        self.pipeline.close();
    }

    async fn announce(&self, notice: SystemNotice) {
        if self.pipeline.notify(notice).await.is_err() {
            debug!("Notice not delivered, channel closed");
        }
    }
}

/// Run `future` unless shutdown is requested first
async fn cancellable<F: Future>(token: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = future => Some(output),
    }
}
