use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use switchboard_core::config::Config;
use switchboard_core::executor::{OutputBank, StepExecutor};
use switchboard_core::step::{PulseStep, Step};

use crate::gpio::RppalBank;

/// Pulse each configured line (or just `only`) through the same executor
/// path the daemon uses, so a wiring check exercises real behavior.
pub fn run(config_path: &Path, only: Option<&str>) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    if !config.gpio.enabled {
        bail!("gpio is disabled in the config");
    }
    if config.gpio.lines.is_empty() {
        bail!("no gpio lines configured");
    }
    if let Some(name) = only {
        if !config.gpio.lines.contains_key(name) {
            bail!("line '{name}' is not configured");
        }
    }

    let bank = Arc::new(RppalBank::new(&config.gpio).context("failed to initialize gpio")?);

    let names = match only {
        Some(name) => vec![name.to_string()],
        None => bank.lines(),
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let executor = StepExecutor::new(Some(bank.clone() as Arc<dyn OutputBank>));
        let mut failed = false;
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            println!("Pulsing '{name}'...");
            let result = executor.execute(&Step::Pulse(PulseStep::new(name))).await;
            if result.ok {
                println!("  ✓ {}", result.detail);
            } else {
                failed = true;
                println!("  ✗ {}", result.detail);
            }
        }
        bank.shutdown();
        if failed {
            bail!("some lines failed to pulse");
        }
        Ok(())
    })
}
