//! Config Command

use crate::markers;
use anyhow::{Context, Result};
use blobvault_client::config::{self, BlobVaultConfig};
use console::style;

pub enum ConfigAction {
    Show,
    Path,
    Init { force: bool },
    Set { key: String, value: String },
}

const VALID_KEYS: &str = "server.origin, transfer.mode, transfer.max_chunk_size, \
    transfer.max_suspension_retries, transfer.strict_reassembly, transfer.request_timeout_secs, \
    transfer.temp_dir, auth.access_token, auth.user_group_id, auth.mail_group_id";

pub fn run(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show(),
        ConfigAction::Path => {
            println!("{}", config::config_file_path()?.display());
            Ok(())
        }
        ConfigAction::Init { force } => init(force),
        ConfigAction::Set { key, value } => set(&key, value),
    }
}

fn show() -> Result<()> {
    let cfg = config::load_config();
    println!();
    println!("{}", style("BlobVault Configuration").bold().underlined());
    println!();
    println!("{}", style("[server]").cyan());
    println!("  origin = \"{}\"", cfg.server.origin);
    println!();
    println!("{}", style("[transfer]").cyan());
    println!("  mode = \"{}\"", cfg.transfer.mode);
    println!("  max_chunk_size = {}", cfg.transfer.max_chunk_size);
    println!("  max_suspension_retries = {}", cfg.transfer.max_suspension_retries);
    println!("  strict_reassembly = {}", cfg.transfer.strict_reassembly);
    println!("  request_timeout_secs = {}", cfg.transfer.request_timeout_secs);
    if let Some(dir) = &cfg.transfer.temp_dir {
        println!("  temp_dir = \"{}\"", dir.display());
    }
    println!();
    println!("{}", style("[auth]").cyan());
    let token = if cfg.auth.access_token.is_empty() {
        "(not set)"
    } else {
        "(set)"
    };
    println!("  access_token = {}", token);
    if let Some(group) = &cfg.auth.user_group_id {
        println!("  user_group_id = \"{}\"", group);
    }
    if let Some(group) = &cfg.auth.mail_group_id {
        println!("  mail_group_id = \"{}\"", group);
    }
    println!();

    if let Ok(path) = config::config_file_path() {
        println!("{} {}", style("Config file:").dim(), path.display());
        if !path.exists() {
            println!(
                "{} Run '{}' to create it",
                style("(not created yet)").yellow(),
                style("blobvault config init").green()
            );
        }
    }
    Ok(())
}

fn init(force: bool) -> Result<()> {
    let path = config::config_file_path()?;
    if path.exists() && !force {
        println!(
            "{} Config file already exists at {}",
            markers::caution(),
            path.display()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(&BlobVaultConfig::default())?;
    println!(
        "{} Config file created at {}",
        markers::done(),
        path.display()
    );
    Ok(())
}

fn set(key: &str, value: String) -> Result<()> {
    let mut cfg = config::load_config();
    apply(&mut cfg, key, value)?;
    cfg.validate().context("Refusing to save invalid configuration")?;
    config::save_config(&cfg)?;
    println!("{} Set {}", markers::done(), key);
    Ok(())
}

fn apply(cfg: &mut BlobVaultConfig, key: &str, value: String) -> Result<()> {
    match key {
        "server.origin" => cfg.server.origin = value,
        "transfer.mode" => cfg.transfer.mode = value.parse()?,
        "transfer.max_chunk_size" => {
            cfg.transfer.max_chunk_size = value.parse().context("Expected a byte count")?
        }
        "transfer.max_suspension_retries" => {
            cfg.transfer.max_suspension_retries = value.parse().context("Expected a number")?
        }
        "transfer.strict_reassembly" => {
            cfg.transfer.strict_reassembly = value.parse().context("Expected true or false")?
        }
        "transfer.request_timeout_secs" => {
            cfg.transfer.request_timeout_secs = value.parse().context("Expected seconds")?
        }
        "transfer.temp_dir" => cfg.transfer.temp_dir = Some(value.into()),
        "auth.access_token" => cfg.auth.access_token = value,
        "auth.user_group_id" => cfg.auth.user_group_id = Some(value),
        "auth.mail_group_id" => cfg.auth.mail_group_id = Some(value),
        _ => anyhow::bail!("Unknown config key: {}. Valid keys: {}", key, VALID_KEYS),
    }
    Ok(())
}
