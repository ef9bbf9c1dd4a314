use anyhow::Context;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use qms_core::{AppError, ErrorMetadata, LogFormat, LogLevel};

/// Initialize tracing for the CLI. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Logs a failed command at the level its error kind calls for and returns
/// the line shown to the operator.
pub fn report_error(err: &anyhow::Error) -> String {
    let Some(app_err) = err.downcast_ref::<AppError>() else {
        tracing::error!(error = %format!("{:#}", err), "Command failed");
        return format!("{:#}", err);
    };

    let code = app_err.error_code();
    match app_err.log_level() {
        LogLevel::Debug => tracing::debug!(error_code = code, error = %app_err, "Command failed"),
        LogLevel::Warn => tracing::warn!(error_code = code, error = %app_err, "Command failed"),
        LogLevel::Error => tracing::error!(error_code = code, error = %app_err, "Command failed"),
    }

    match app_err.suggested_action() {
        Some(action) => format!("{} [{}]. {}", app_err.client_message(), code, action),
        None => format!("{} [{}]", app_err.client_message(), code),
    }
}

/// Accepts RFC 3339 timestamps or plain dates (midnight UTC).
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD or RFC 3339", s))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| Utc.from_utc_datetime(&dt))
        .with_context(|| format!("Invalid date '{}'", s))
}

/// Quota default given on the command line as `name:unit=value`
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaArg {
    pub name: String,
    pub unit: String,
    pub value: f64,
}

impl std::str::FromStr for QuotaArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, value) = s
            .split_once('=')
            .with_context(|| format!("Invalid quota '{}': expected name:unit=value", s))?;
        let (name, unit) = resource
            .split_once(':')
            .with_context(|| format!("Invalid quota '{}': expected name:unit=value", s))?;
        let value = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid quota value in '{}'", s))?;

        if name.trim().is_empty() || unit.trim().is_empty() {
            anyhow::bail!("Invalid quota '{}': name and unit must be set", s);
        }

        Ok(QuotaArg {
            name: name.trim().to_string(),
            unit: unit.trim().to_string(),
            value,
        })
    }
}
