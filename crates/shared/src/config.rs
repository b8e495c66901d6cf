//! Application configuration management.
//!
//! Values come from `config/default.toml`, `config/{RUN_MODE}.toml` and
//! `COOPBANK__SECTION__KEY` environment variables, in that order of
//! precedence (last wins).

use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Business policy knobs.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Scheduled job settings.
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Business policy parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Ledger entries older than this many days cannot be reversed.
    pub reversal_window_days: u32,
    /// Daily delinquency penalty, percent of the installment payment.
    pub daily_penalty_rate_pct: Decimal,
    /// Smallest accepted mutual-fund contribution.
    pub min_contribution: Decimal,
    /// Largest aid amount a member may request. `None` means unlimited.
    pub max_aid_amount: Option<Decimal>,
    /// Refuse loan approval while required guarantors are missing.
    pub enforce_guarantors_on_approve: bool,
    /// Reminder horizon for installments about to fall due.
    pub due_soon_days: u32,
    /// Overdue reminders repeat every this many days.
    pub overdue_reminder_interval_days: u32,
    /// Loans held during the year needed to share in the dividend pool.
    pub dividend_min_loans: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            reversal_window_days: 30,
            daily_penalty_rate_pct: Decimal::new(10, 2),
            min_contribution: Decimal::ZERO,
            max_aid_amount: None,
            enforce_guarantors_on_approve: false,
            due_soon_days: 5,
            overdue_reminder_interval_days: 7,
            dividend_min_loans: 2,
        }
    }
}

/// Scheduled job settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// IANA timezone used to derive the job's business date.
    pub timezone: String,
    /// Delivery attempts before a notification is abandoned.
    pub notification_max_attempts: i32,
    /// Notifications handed to the dispatcher per flush.
    pub notification_batch_size: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Tegucigalpa".to_string(),
            notification_max_attempts: 5,
            notification_batch_size: 50,
        }
    }
}

impl JobsConfig {
    /// Parses the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known IANA zone.
    pub fn tz(&self) -> Result<Tz, config::ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| config::ConfigError::Message(format!("unknown timezone: {}", self.timezone)))
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("COOPBANK").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_load_defaults() {
        temp_env::with_vars(
            [
                ("COOPBANK__DATABASE__URL", Some("postgres://localhost/coopbank")),
                ("COOPBANK__POLICY__REVERSAL_WINDOW_DAYS", None),
                ("COOPBANK__POLICY__DIVIDEND_MIN_LOANS", None),
                ("COOPBANK__JOBS__TIMEZONE", None),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/coopbank");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.policy.reversal_window_days, 30);
                assert_eq!(config.policy.daily_penalty_rate_pct, dec!(0.10));
                assert_eq!(config.policy.max_aid_amount, None);
                assert!(!config.policy.enforce_guarantors_on_approve);
                assert_eq!(config.policy.dividend_min_loans, 2);
                assert_eq!(config.jobs.notification_batch_size, 50);
            },
        );
    }

    #[test]
    fn test_env_overrides() {
        temp_env::with_vars(
            [
                ("COOPBANK__DATABASE__URL", Some("postgres://db/coop")),
                ("COOPBANK__POLICY__REVERSAL_WINDOW_DAYS", Some("15")),
                ("COOPBANK__POLICY__MAX_AID_AMOUNT", Some("5000.00")),
                ("COOPBANK__POLICY__DIVIDEND_MIN_LOANS", Some("3")),
                ("COOPBANK__JOBS__TIMEZONE", Some("UTC")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.policy.reversal_window_days, 15);
                assert_eq!(config.policy.max_aid_amount, Some(dec!(5000.00)));
                assert_eq!(config.policy.dividend_min_loans, 3);
                assert_eq!(config.jobs.tz().unwrap(), chrono_tz::UTC);
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_var_unset("COOPBANK__DATABASE__URL", || {
            assert!(AppConfig::load().is_err());
        });
    }

    #[test]
    fn test_unknown_timezone() {
        let jobs = JobsConfig {
            timezone: "Mars/Olympus".to_string(),
            ..JobsConfig::default()
        };
        assert!(jobs.tz().is_err());
    }
}
