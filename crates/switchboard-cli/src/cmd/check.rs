use std::path::Path;

use anyhow::Context;
use switchboard_core::config::{has_errors, Config, ConfigWarning, WarnLevel};

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let mut findings = config.validate();

    // A self-consistent config can still reference programs that are not
    // installed on this host.
    for program in config.programs() {
        if which::which(&program).is_err() {
            findings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("program '{program}' not found on PATH"),
            });
        }
    }

    // Building the binding table catches what per-section validation
    // cannot, but its findings duplicate validation errors, so only try
    // when the config is otherwise clean.
    if !has_errors(&findings) {
        if let Err(e) = config.action_map() {
            findings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: e.to_string(),
            });
        }
    }

    if json {
        let report = serde_json::json!({
            "config": config_path.display().to_string(),
            "findings": findings,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if findings.is_empty() {
        println!("Config is valid. No findings.");
    } else {
        for finding in &findings {
            let prefix = match finding.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", finding.message);
        }
    }

    if has_errors(&findings) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
