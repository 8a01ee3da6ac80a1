//! Air-Quality Node
//!
//! Loads the sensor table, brings the sensors up, and polls them on a fixed
//! interval, writing each pass as report lines.

mod report;
mod settings;

pub use report::{format_line, write_report};
pub use settings::{
    load_config, parse_config, NodeConfig, ReportConfig, ReportFormat, DEFAULT_CONFIG_PATH,
};

use anyhow::{anyhow, Context};
use sensor_manager::{HostPorts, MeasurementManager, PortResolver};
use sensor_protocol::{Clock, MonotonicClock};
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Initialize logging; log lines go to stderr so stdout carries only reports
pub fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let level: Level = level
        .parse()
        .map_err(|_| anyhow!("invalid log level '{}'", level))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.context("failed to set tracing subscriber")
}

/// Poll loop around a measurement manager
pub struct NodeRunner<R, C = MonotonicClock> {
    manager: MeasurementManager<R, C>,
    report: ReportConfig,
    poll_interval: Duration,
    retry_every_passes: u64,
}

impl NodeRunner<HostPorts> {
    /// Build the manager from `config` and bring the sensors up
    pub async fn start(config: NodeConfig) -> anyhow::Result<Self> {
        let manager = MeasurementManager::new(
            config.manager.clone(),
            config.sensors.clone(),
            config.ports.clone(),
            MonotonicClock::new(),
        )
        .context("invalid manager configuration")?;

        tokio::time::sleep(config.startup_delay()).await;
        Ok(Self::with_manager(manager, &config).await)
    }
}

impl<R: PortResolver, C: Clock> NodeRunner<R, C> {
    /// Construct and activate the manager's sensors
    pub async fn with_manager(mut manager: MeasurementManager<R, C>, config: &NodeConfig) -> Self {
        manager.create_sensors();
        if manager.begin_sensors().await == 0 {
            warn!("No sensors ready, polling will write nothing until a retry succeeds");
        }

        Self {
            manager,
            report: config.report.clone(),
            poll_interval: config.poll_interval(),
            retry_every_passes: config.retry_every_passes,
        }
    }

    pub fn manager(&self) -> &MeasurementManager<R, C> {
        &self.manager
    }

    /// Run one poll pass and report it; returns the number of lines written
    pub async fn run_pass<W: Write>(&mut self, out: &mut W) -> anyhow::Result<usize> {
        self.manager.poll_all_sensors().await;
        let lines = write_report(out, self.manager.last_pass(), &self.report)
            .context("failed to write report")?;
        debug!("Pass reported {} lines, buffer {:?}", lines, self.manager.buffer_stats());
        Ok(lines)
    }

    /// Poll on the configured interval until `shutdown` completes; returns the pass count
    pub async fn run_until<W, F>(&mut self, out: &mut W, shutdown: F) -> anyhow::Result<u64>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Polling every {:?}", self.poll_interval);
        let mut passes = 0u64;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            if self.retry_every_passes > 0
                && passes > 0
                && passes % self.retry_every_passes == 0
                && self.manager.sensors_ready() < self.manager.health().count()
            {
                self.manager.begin_sensors().await;
            }

            self.run_pass(out).await?;
            passes += 1;
        }

        info!("Stopped after {} passes", passes);
        Ok(passes)
    }
}
