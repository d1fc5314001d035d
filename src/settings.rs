//! Environment-sourced configuration.
//!
//! Every credential and endpoint comes from the process environment (with
//! `.env` support through dotenvy in the binaries). Required keys that are
//! missing fail startup with an error naming the variable.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::room::control::S3Upload;

/// How long a session runs before the delayed shutdown fires.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 10 * 60;
/// Allowed interview attempts per candidate identity.
pub const DEFAULT_USAGE_LIMIT: u32 = 3;
/// Participant display name that disables recording.
pub const DEFAULT_TEST_PARTICIPANT_NAME: &str = "TEST";

#[derive(Debug, Clone)]
pub struct Settings {
    pub room_service: RoomServiceSettings,
    pub engine: EngineSettings,
    pub storage: StorageSettings,
    pub table: TableSettings,
    pub tenants: TenantSettings,
    pub session: SessionSettings,
}

#[derive(Debug, Clone)]
pub struct RoomServiceSettings {
    /// HTTP base URL for the control plane (room deletion, egress).
    pub http_url: String,
    /// WebSocket base URL for the dispatch and signal connections.
    pub ws_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// WebSocket base URL of the realtime conversational engine.
    pub url: String,
    pub api_key: String,
}

/// S3-compatible target for session recordings.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub endpoint: String,
}

impl StorageSettings {
    pub fn to_s3_upload(&self) -> S3Upload {
        S3Upload {
            access_key: self.access_key.clone(),
            secret: self.secret_key.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            force_path_style: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableSettings {
    pub api_key: String,
    pub base_id: String,
    pub table_id: String,
}

#[derive(Debug, Clone)]
pub struct TenantSettings {
    pub primary: TenantCredentials,
    pub secondary: TenantCredentials,
}

/// Sign-in credentials for one applicant-tracking tenant.
#[derive(Debug, Clone)]
pub struct TenantCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Delay before the automatic session shutdown.
    pub timeout: Duration,
    /// Bound on the wait for a participant to join. `None` waits forever,
    /// which mirrors how the service behaved before the knob existed.
    pub join_timeout: Option<Duration>,
    pub usage_limit: u32,
    /// Participant display name that skips recording.
    pub test_participant_name: String,
    /// Optional JSON file overriding the built-in interview script.
    pub script_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            room_service: RoomServiceSettings {
                http_url: required("ROOM_SERVICE_URL")?,
                ws_url: required("ROOM_SERVICE_WS_URL")?,
                api_key: required("ROOM_SERVICE_API_KEY")?,
            },
            engine: EngineSettings {
                url: required("REALTIME_ENGINE_URL")?,
                api_key: required("REALTIME_API_KEY")?,
            },
            storage: StorageSettings {
                access_key: required("S3_ACCESS_KEY")?,
                secret_key: required("S3_SECRET_KEY")?,
                region: required("S3_REGION")?,
                endpoint: required("S3_ENDPOINT")?,
            },
            table: TableSettings {
                api_key: required("TABLE_API_KEY")?,
                base_id: optional("TABLE_BASE_ID")
                    .unwrap_or_else(|| "appCandidatePipeline".to_string()),
                table_id: optional("TABLE_TABLE_ID")
                    .unwrap_or_else(|| "tblCandidates".to_string()),
            },
            tenants: TenantSettings {
                primary: TenantCredentials {
                    email: required("ATS_PRIMARY_USERNAME")?,
                    password: required("ATS_PRIMARY_PASSWORD")?,
                },
                secondary: TenantCredentials {
                    email: required("ATS_SECONDARY_USERNAME")?,
                    password: required("ATS_SECONDARY_PASSWORD")?,
                },
            },
            session: SessionSettings {
                timeout: Duration::from_secs(
                    parsed("SESSION_TIMEOUT_SECS")?.unwrap_or(DEFAULT_SESSION_TIMEOUT_SECS),
                ),
                join_timeout: parsed("PARTICIPANT_JOIN_TIMEOUT_SECS")?.map(Duration::from_secs),
                usage_limit: parsed("USAGE_LIMIT")?.unwrap_or(DEFAULT_USAGE_LIMIT),
                test_participant_name: optional("TEST_PARTICIPANT_NAME")
                    .unwrap_or_else(|| DEFAULT_TEST_PARTICIPANT_NAME.to_string()),
                script_path: optional("INTERVIEW_SCRIPT_PATH").map(PathBuf::from),
            },
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Set {} environment variable", key))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => {
            let value = raw
                .parse()
                .with_context(|| format!("{} is not a valid value for {}", raw, key))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED_KEYS: &[&str] = &[
        "ROOM_SERVICE_URL",
        "ROOM_SERVICE_WS_URL",
        "ROOM_SERVICE_API_KEY",
        "REALTIME_ENGINE_URL",
        "REALTIME_API_KEY",
        "S3_ACCESS_KEY",
        "S3_SECRET_KEY",
        "S3_REGION",
        "S3_ENDPOINT",
        "TABLE_API_KEY",
        "ATS_PRIMARY_USERNAME",
        "ATS_PRIMARY_PASSWORD",
        "ATS_SECONDARY_USERNAME",
        "ATS_SECONDARY_PASSWORD",
    ];

    #[test]
    fn loads_with_defaults_and_fails_on_missing_key() {
        for key in REQUIRED_KEYS {
            std::env::set_var(key, format!("{}-value", key.to_lowercase()));
        }
        std::env::remove_var("SESSION_TIMEOUT_SECS");
        std::env::remove_var("PARTICIPANT_JOIN_TIMEOUT_SECS");
        std::env::remove_var("USAGE_LIMIT");
        std::env::remove_var("TEST_PARTICIPANT_NAME");
        std::env::remove_var("INTERVIEW_SCRIPT_PATH");
        std::env::remove_var("TABLE_BASE_ID");
        std::env::remove_var("TABLE_TABLE_ID");

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.session.timeout, Duration::from_secs(600));
        assert_eq!(settings.session.join_timeout, None);
        assert_eq!(settings.session.usage_limit, 3);
        assert_eq!(settings.session.test_participant_name, "TEST");
        assert_eq!(settings.table.base_id, "appCandidatePipeline");
        assert!(settings.storage.to_s3_upload().force_path_style);

        std::env::set_var("SESSION_TIMEOUT_SECS", "90");
        std::env::set_var("PARTICIPANT_JOIN_TIMEOUT_SECS", "30");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.session.timeout, Duration::from_secs(90));
        assert_eq!(
            settings.session.join_timeout,
            Some(Duration::from_secs(30))
        );

        std::env::set_var("SESSION_TIMEOUT_SECS", "not-a-number");
        assert!(Settings::from_env().is_err());
        std::env::remove_var("SESSION_TIMEOUT_SECS");

        std::env::remove_var("ROOM_SERVICE_API_KEY");
        let err = Settings::from_env().unwrap_err();
        assert!(format!("{:#}", err).contains("ROOM_SERVICE_API_KEY"));
    }
}
