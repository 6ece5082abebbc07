use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 300 * 1024 * 1024;

/// Read-only settings resolved once at startup and shared by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    pub download_timeout: Duration,
    pub max_download_bytes: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
        }
    }
}

/// Raw values as they arrive from the command line or environment, before
/// validation. `None` means "not provided".
#[derive(Debug, Default, Clone)]
pub struct RawSettings {
    pub port: Option<String>,
    pub timeout_secs: Option<String>,
    pub max_bytes: Option<String>,
}

impl ServiceConfig {
    pub fn from_raw(raw: &RawSettings) -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = non_blank(&raw.port) {
            config.port = port
                .parse()
                .with_context(|| format!("invalid port: {port:?}"))?;
        }

        if let Some(secs) = non_blank(&raw.timeout_secs) {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("invalid download timeout: {secs:?}"))?;
            if secs == 0 {
                bail!("download timeout must be at least one second");
            }
            config.download_timeout = Duration::from_secs(secs);
        }

        if let Some(bytes) = non_blank(&raw.max_bytes) {
            let bytes: u64 = bytes
                .parse()
                .with_context(|| format!("invalid maximum download size: {bytes:?}"))?;
            if bytes == 0 {
                bail!("maximum download size must be greater than zero");
            }
            config.max_download_bytes = bytes;
        }

        Ok(config)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
