use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use switchboard_core::action::ActionMap;
use switchboard_core::config::{has_errors, Config, ProbeConfig, WarnLevel};
use switchboard_core::debounce::{Debouncer, PublishSink};
use switchboard_core::dispatch::{consume, Dispatcher};
use switchboard_core::event::pump_events;
use switchboard_core::executor::{run_command, OutputBank, StepExecutor};
use switchboard_core::step::CommandStep;
use tracing::{error, info, warn};

use crate::gpio::RppalBank;
use crate::input::{self, EncoderCodes, EvdevSource};
use crate::mqtt::{DiscardSink, MqttSink};

pub fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let findings = config.validate();
    for finding in &findings {
        match finding.level {
            WarnLevel::Warning => warn!("{}", finding.message),
            WarnLevel::Error => error!("{}", finding.message),
        }
    }
    if has_errors(&findings) {
        anyhow::bail!("refusing to start with config errors (see 'switchboard check')");
    }

    let map = config.action_map().context("failed to build event bindings")?;

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(run_daemon(config, map));
    // The event pump sits in a blocking device read; don't wait for it
    // on the way out.
    rt.shutdown_timeout(Duration::from_millis(200));
    result
}

async fn run_daemon(config: Config, map: ActionMap) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "switchboard starting");

    // A missing output bank is a degraded mode, not a startup failure:
    // button actions that only run commands keep working.
    let bank: Option<Arc<RppalBank>> = if config.gpio.enabled && !config.gpio.lines.is_empty() {
        match RppalBank::new(&config.gpio) {
            Ok(bank) => Some(Arc::new(bank)),
            Err(e) => {
                warn!(error = format!("{e:#}"), "gpio unavailable, pulse steps will be skipped");
                None
            }
        }
    } else {
        None
    };
    if let Some(bank) = &bank {
        info!(lines = ?bank.lines(), "output bank ready, all lines inactive");
    }

    let mqtt: Option<Arc<MqttSink>> = if config.batches.is_empty() {
        None
    } else {
        config.mqtt.as_ref().map(|m| Arc::new(MqttSink::start(m)))
    };
    let sink: Arc<dyn PublishSink> = match &mqtt {
        Some(sink) => sink.clone(),
        None => Arc::new(DiscardSink),
    };

    let debouncer = Debouncer::new(config.batch_settings(), sink);
    let executor = StepExecutor::new(bank.clone().map(|b| b as Arc<dyn OutputBank>));
    let dispatcher = Dispatcher::new(map, executor, debouncer);

    for (code, binding) in dispatcher.map().iter_sorted() {
        info!(code, target = binding.target(), "binding");
    }

    if let Some(probe) = &config.probe {
        run_probe(probe).await;
    }

    let device = input::open_device(&config.device)?;
    info!(
        device = device.name().unwrap_or("(unnamed)"),
        "listening for input events"
    );
    let codes = EncoderCodes::from_config(config.encoder.as_ref());
    let source = EvdevSource::new(device, codes);

    let (tx, rx) = tokio::sync::mpsc::channel(64);
    let pump = tokio::task::spawn_blocking(move || pump_events(source, tx));

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        _ = consume(rx, &dispatcher) => {
            // The pump only stops when the device does.
            match pump.await {
                Ok(end) => warn!(reason = ?end, "input device stopped delivering events"),
                Err(e) => error!(error = %e, "event pump panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => info!("interrupt received, shutting down"),
        _ = sigterm.recv() => info!("termination requested, shutting down"),
    }

    // Leave the hardware quiet no matter why we are exiting.
    if let Some(bank) = &bank {
        bank.shutdown();
    }
    if let Some(mqtt) = &mqtt {
        mqtt.shutdown().await;
    }
    info!("switchboard stopped");
    Ok(())
}

/// One best-effort command at startup that reports which input the
/// monitor currently shows. Failures are logged and never fatal.
async fn run_probe(probe: &ProbeConfig) {
    let mut step = CommandStep::new(&probe.program, &[]);
    step.args = probe.args.clone();
    step.timeout_secs = probe.timeout_secs;

    let outcome = run_command(&step).await;
    if !outcome.ok {
        warn!(detail = %outcome.detail, "startup probe failed");
        return;
    }

    let stdout = outcome.stdout.to_lowercase();
    let label = probe
        .matches
        .iter()
        .find(|m| stdout.contains(&m.contains.to_lowercase()))
        .map(|m| m.label.as_str())
        .unwrap_or("unknown");
    info!(label, "startup probe result");
}
