use agrogest_core::config::normalize_remote_url;
use agrogest_core::util::normalize_text_option;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::commands::common::Context;
use crate::config_profiles::{default_config_path, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, ctx: &Context) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            remote_url,
            token,
            sync_interval,
            no_activate,
        } => {
            let updates = ProfileUpdates {
                remote_url,
                token,
                sync_interval,
            };
            run_config_init(profile.as_deref().or(ctx.profile.as_deref()), updates, no_activate)
        }
        ConfigCommands::Show => run_config_show(ctx),
    }
}

#[derive(Debug, Default)]
pub struct ProfileUpdates {
    pub remote_url: Option<String>,
    pub token: Option<String>,
    pub sync_interval: Option<u64>,
}

fn run_config_init(
    profile_name: Option<&str>,
    updates: ProfileUpdates,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load()?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let profile = merge_profile(existing, updates)?;
    config.upsert_profile(profile_name.clone(), profile, !no_activate);
    let path = config.save()?;

    println!("Saved profile '{profile_name}' to {}", path.display());
    if config.active_profile.as_deref() == Some(profile_name.as_str()) {
        println!("Active profile: {profile_name}");
    }
    Ok(())
}

/// Apply explicit values over `existing`; unset values are kept.
pub fn merge_profile(
    existing: CliProfile,
    updates: ProfileUpdates,
) -> Result<CliProfile, CliError> {
    let remote_url = match normalize_text_option(updates.remote_url) {
        Some(url) => Some(normalize_remote_url(url)?),
        None => existing.remote_url,
    };
    let profile = CliProfile {
        remote_url,
        auth_token: normalize_text_option(updates.token).or(existing.auth_token),
        sync_interval_secs: updates.sync_interval.or(existing.sync_interval_secs),
    };
    profile.validate()?;
    Ok(profile)
}

#[derive(Debug, Serialize)]
struct ResolvedConfig {
    config_path: String,
    profile: String,
    remote_url: Option<String>,
    has_token: bool,
    sync_interval_secs: u64,
}

fn run_config_show(ctx: &Context) -> Result<(), CliError> {
    let profiles = CliProfilesConfig::load()?;
    let resolved = ctx.sync_config()?;
    let view = ResolvedConfig {
        config_path: default_config_path().display().to_string(),
        profile: profiles.resolve_profile_name(ctx.profile.as_deref()),
        remote_url: resolved.remote_url.clone(),
        has_token: resolved.auth_token.is_some(),
        sync_interval_secs: resolved.sync_interval_secs,
    };

    ctx.emit(&view, || {
        vec![
            format!("Config file:   {}", view.config_path),
            format!("Profile:       {}", view.profile),
            format!(
                "Remote URL:    {}",
                view.remote_url.as_deref().unwrap_or("(local only)")
            ),
            format!("Token:         {}", if view.has_token { "set" } else { "not set" }),
            format!("Sync interval: {}s", view.sync_interval_secs),
        ]
    })
}
