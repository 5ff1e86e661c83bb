//! CPU utilization runner

use async_trait::async_trait;
use dms_core::{Error, Result, Rule, CPU_ALL, CPU_SAMPLE_MILLIS};
use std::time::Duration;
use sysinfo::System;
use tracing::debug;

use crate::traits::RuleRunner;

/// Which utilization figure a CPU rule asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuTarget {
    All,
    Core(usize),
}

impl CpuTarget {
    pub fn parse(argument: &str) -> Result<Self> {
        if argument == CPU_ALL {
            return Ok(CpuTarget::All);
        }
        argument
            .trim()
            .parse::<usize>()
            .map(CpuTarget::Core)
            .map_err(|_| {
                Error::run(format!(
                    "CPU argument must be \"{}\" or a core index, got '{}'",
                    CPU_ALL, argument
                ))
            })
    }
}

/// One utilization sample
#[derive(Debug, Clone)]
struct CpuSample {
    global: f32,
    per_core: Vec<f32>,
}

impl CpuSample {
    fn select(&self, target: CpuTarget) -> Result<f32> {
        match target {
            CpuTarget::All => Ok(self.global),
            CpuTarget::Core(index) => self.per_core.get(index).copied().ok_or_else(|| {
                Error::run(format!(
                    "CPU core {} does not exist ({} cores available)",
                    index,
                    self.per_core.len()
                ))
            }),
        }
    }
}

/// Samples CPU load over a short window
pub struct CpuRunner {
    sample_window: Duration,
}

impl CpuRunner {
    pub fn new(sample_window: Duration) -> Self {
        Self {
            sample_window: sample_window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    async fn sample(&self) -> Result<CpuSample> {
        let window = self.sample_window;
        tokio::task::spawn_blocking(move || {
            let mut system = System::new();
            system.refresh_cpu();
            std::thread::sleep(window);
            system.refresh_cpu();
            CpuSample {
                global: system.global_cpu_info().cpu_usage(),
                per_core: system.cpus().iter().map(|c| c.cpu_usage()).collect(),
            }
        })
        .await
        .map_err(|e| Error::run(format!("CPU sampling task failed: {}", e)))
    }
}

impl Default for CpuRunner {
    fn default() -> Self {
        Self::new(Duration::from_millis(CPU_SAMPLE_MILLIS))
    }
}

#[async_trait]
impl RuleRunner for CpuRunner {
    async fn run(&self, rule: &Rule) -> Result<String> {
        let target = CpuTarget::parse(&rule.argument)?;
        let sample = self.sample().await?;
        let usage = sample.select(target)?;

        debug!("CPU usage for {:?}: {:.1}%", target, usage);
        Ok(format!("{:.1}", usage))
    }

    fn kind_name(&self) -> &'static str {
        "cpu"
    }
}
