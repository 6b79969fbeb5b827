use std::env;

use travelgrid_core::util::{is_http_url, normalize_text_option};

use super::common::{ACCESS_TOKEN_ENV, API_URL_ENV, USER_ID_ENV};
use crate::cli::ConfigCommands;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_url,
            user_id,
            access_token,
            app_version,
            no_activate,
        } => run_config_init(
            global_profile,
            ProfileInput {
                api_base_url: api_url,
                user_id,
                access_token,
                app_version,
            },
            no_activate,
        ),
        ConfigCommands::Show => run_config_show(global_profile),
    }
}

/// Values passed on the command line for `config init`
#[derive(Debug, Default)]
pub struct ProfileInput {
    pub api_base_url: Option<String>,
    pub user_id: Option<String>,
    pub access_token: Option<String>,
    pub app_version: Option<String>,
}

pub fn run_config_init(
    profile_name: Option<&str>,
    input: ProfileInput,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(&existing, input, |key| env::var(key).ok());
    validate_profile(&merged)?;
    *config.profile_mut_or_default(&profile_name) = merged;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profile(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let missing = profile.missing_fields();
    if missing.is_empty() {
        println!("Profile '{profile_name}' is ready. Run `travelgrid register` next.");
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing.join(", ")
        );
    }
    Ok(())
}

/// Explicit flags win, then environment, then the existing profile
pub fn merge_profile(
    existing: &CliProfile,
    input: ProfileInput,
    lookup: impl Fn(&str) -> Option<String>,
) -> CliProfile {
    CliProfile {
        api_base_url: normalize_text_option(input.api_base_url)
            .or_else(|| normalize_text_option(lookup(API_URL_ENV)))
            .or_else(|| normalize_text_option(existing.api_base_url.clone())),
        user_id: normalize_text_option(input.user_id)
            .or_else(|| normalize_text_option(lookup(USER_ID_ENV)))
            .or_else(|| normalize_text_option(existing.user_id.clone())),
        access_token: normalize_text_option(input.access_token)
            .or_else(|| normalize_text_option(lookup(ACCESS_TOKEN_ENV)))
            .or_else(|| normalize_text_option(existing.access_token.clone())),
        app_version: normalize_text_option(input.app_version)
            .or_else(|| normalize_text_option(existing.app_version.clone())),
    }
}

pub fn validate_profile(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = normalize_text_option(profile.api_base_url.clone()) {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "api_base_url must include http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    println!("Profile: {profile_name}");
    for line in profile_lines(profile) {
        println!("{line}");
    }
    Ok(())
}

pub fn profile_lines(profile: &CliProfile) -> Vec<String> {
    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "(not set)".to_string());
    vec![
        format!("  api_base_url: {}", show(&profile.api_base_url)),
        format!("  user_id: {}", show(&profile.user_id)),
        format!(
            "  access_token: {}",
            if profile.access_token.is_some() {
                "(set)"
            } else {
                "(not set)"
            }
        ),
        format!("  app_version: {}", show(&profile.app_version)),
    ]
}
