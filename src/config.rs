use crate::error::{DashboardError, Result};
use crate::profile::DashboardProfile;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default address the web dashboard listens on
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Mail relay settings for the "email this chart" action
///
/// There is no built-in account: without a host the email endpoint reports
/// that mail is not configured.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl SmtpSettings {
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.from.is_empty()
    }
}

/// Application configuration
///
/// Read from an optional JSON file, then overridden by `FILLRATE_*`
/// environment variables, then by command line flags in the binaries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address for the web dashboard
    pub bind: String,

    /// Name of a built-in profile
    pub profile: String,

    /// JSON profile file; takes precedence over `profile`
    pub profile_file: Option<PathBuf>,

    /// File loaded for sessions that never uploaded anything
    pub data_path: Option<PathBuf>,

    /// Directory served under `/static`
    pub static_dir: PathBuf,

    pub smtp: SmtpSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind: DEFAULT_BIND.to_string(),
            profile: "po_fill_rate".to_string(),
            profile_file: None,
            data_path: None,
            static_dir: PathBuf::from("static"),
            smtp: SmtpSettings {
                port: 465,
                ..SmtpSettings::default()
            },
        }
    }
}

impl AppConfig {
    /// Load the configuration file (if any) and apply the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                info!("Reading configuration from {}", p.display());
                let contents = std::fs::read_to_string(p)?;
                serde_json::from_str(&contents)?
            }
            None => AppConfig::default(),
        };
        config.apply_env(&std::env::vars().collect())?;
        Ok(config)
    }

    /// Apply `FILLRATE_*` overrides from a map of variables
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) -> Result<()> {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();

        if let Some(v) = get("FILLRATE_BIND") {
            self.bind = v;
        }
        if let Some(v) = get("FILLRATE_PROFILE") {
            self.profile = v;
        }
        if let Some(v) = get("FILLRATE_PROFILE_FILE") {
            self.profile_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("FILLRATE_DATA") {
            self.data_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("FILLRATE_SMTP_HOST") {
            self.smtp.host = v;
        }
        if let Some(v) = get("FILLRATE_SMTP_PORT") {
            self.smtp.port = v.parse().map_err(|_| {
                DashboardError::Config(format!("FILLRATE_SMTP_PORT is not a port: {}", v))
            })?;
        }
        if let Some(v) = get("FILLRATE_SMTP_USER") {
            self.smtp.username = v;
        }
        if let Some(v) = get("FILLRATE_SMTP_PASSWORD") {
            self.smtp.password = v;
        }
        if let Some(v) = get("FILLRATE_SMTP_FROM") {
            self.smtp.from = v;
        }
        Ok(())
    }

    /// The dashboard profile this configuration selects
    pub fn dashboard_profile(&self) -> Result<DashboardProfile> {
        match &self.profile_file {
            Some(path) => DashboardProfile::from_json_file(path),
            None => DashboardProfile::builtin(&self.profile),
        }
    }
}
