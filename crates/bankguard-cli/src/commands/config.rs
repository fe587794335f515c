//! Configuration management commands.

use std::process::ExitCode;

use anyhow::{Result, bail};
use bankguard_config::{BankguardConfig, ConfigLoader};

use crate::style::{print_error, print_labeled, print_spacer, print_success};

/// Show the effective configuration.
pub fn show(config: &BankguardConfig, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(config)?),
        "toml" => println!("{}", config.to_toml()?),
        "text" => print_text(config),
        other => bail!("Unknown format '{other}' (expected text, json or toml)"),
    }
    Ok(())
}

fn print_text(config: &BankguardConfig) {
    let policy = &config.policy;
    println!("Policy:");
    print_labeled("MFA window", &format!("{}s", policy.mfa_window_secs));
    print_labeled("Small transfer max", &policy.small_transfer_max.to_string());
    print_labeled("Large transfer max", &policy.large_transfer_max.to_string());
    print_labeled(
        "Fraud score limits",
        &format!(
            "small < {}, large < {}, external < {}",
            policy.small_transfer_fraud_max,
            policy.large_transfer_fraud_max,
            policy.external_transfer_fraud_max
        ),
    );
    print_labeled(
        "Password max age",
        &format!("{} days", policy.password_max_age_days),
    );
    print_labeled(
        "Teller certification",
        &format!("level {}+", policy.teller_min_certification_level),
    );
    print_spacer();

    println!("Store:");
    print_labeled(
        "Seed file",
        &config
            .store
            .seed_file
            .as_ref()
            .map_or_else(|| "(demo fixtures)".to_string(), |p| p.display().to_string()),
    );
    print_spacer();

    println!("Logging:");
    print_labeled("Level", &config.logging.level);
    print_labeled("Audit", &config.logging.audit.to_string());
}

/// Validate configuration files.
pub fn validate(loader: ConfigLoader) -> Result<ExitCode> {
    match loader.load() {
        Ok(_) => {
            print_success("Configuration is valid");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            print_error(&format!("Configuration validation failed: {e:#}"));
            Ok(ExitCode::FAILURE)
        }
    }
}
