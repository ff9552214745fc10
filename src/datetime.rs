//! Server clock for chatrelay.
//!
//! Messages carry two server stamps: a human-readable wall-clock time in the
//! configured timezone, and an RFC 3339 processing timestamp in UTC.

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;

use crate::config::ServerConfig;

/// Format a DateTime<Utc> to the specified timezone.
///
/// # Arguments
///
/// * `dt` - DateTime in UTC
/// * `timezone` - Timezone name (e.g., "Asia/Tokyo", "UTC")
/// * `format` - Output format string (e.g., "%H:%M:%S")
///
/// # Returns
///
/// Formatted datetime string. Falls back to UTC for an unknown timezone.
pub fn format_utc_datetime(dt: &DateTime<Utc>, timezone: &str, format: &str) -> String {
    let tz: Tz = match timezone.parse() {
        Ok(tz) => tz,
        Err(_) => return dt.format(format).to_string(),
    };
    dt.with_timezone(&tz).format(format).to_string()
}

/// Format a DateTime<Utc> as an ISO 8601 timestamp with milliseconds
/// (e.g., "2024-01-15T10:30:00.000Z").
pub fn to_iso8601(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Clock used for stamping messages and rendering `{time}` in replies.
#[derive(Debug, Clone)]
pub struct ServerClock {
    timezone: String,
    format: String,
}

impl ServerClock {
    /// Create a clock for the given timezone and strftime format.
    pub fn new(timezone: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            timezone: timezone.into(),
            format: format.into(),
        }
    }

    /// Create a clock from the server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(&config.timezone, &config.time_format)
    }

    /// Human-readable time for the given instant.
    pub fn display(&self, dt: &DateTime<Utc>) -> String {
        format_utc_datetime(dt, &self.timezone, &self.format)
    }

    /// Human-readable current time.
    pub fn now_display(&self) -> String {
        self.display(&Utc::now())
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}
