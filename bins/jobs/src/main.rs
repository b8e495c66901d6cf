//! Scheduled jobs for Coopbank.
//!
//! Meant to be run by cron or a scheduler once per business day:
//!
//! ```text
//! coopbank-jobs daily                 # accrue, remind, flush
//! coopbank-jobs accrue --date 2026-03-11
//! coopbank-jobs reconcile             # exit code 2 on any mismatch
//! coopbank-jobs open-period --period 202604
//! coopbank-jobs dividends --year 2025     # close, calculate and credit
//! ```
//!
//! The business date defaults to today in `jobs.timezone`.

mod dispatch;

use std::process::ExitCode;

use anyhow::Context;
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use coopbank_core::audit::SYSTEM_ACTOR;
use coopbank_core::dividend::DividendPeriodStatus;
use coopbank_core::fund::{FundError, PeriodKey};
use coopbank_core::notification::DeliveryPolicy;
use coopbank_db::{
    DelinquencyRepository, DividendRepository, FundRepository, NotificationRepository,
    ReconciliationRepository, RepositoryError, connect_with,
};
use coopbank_shared::AppConfig;
use sea_orm::DatabaseConnection;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispatch::LogDispatcher;

/// Coopbank scheduled jobs
#[derive(Parser)]
#[command(name = "coopbank-jobs", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Business date (YYYY-MM-DD); defaults to today in the configured timezone
    #[arg(long, global = true)]
    date: Option<NaiveDate>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Accrue penalties, send reminders and flush the outbox
    Daily,
    /// Accrue penalties on overdue installments
    Accrue,
    /// Enqueue due-soon reminders
    Remind,
    /// Verify every account and fund against its ledger
    Reconcile,
    /// Open the mutual fund period of the business date
    OpenPeriod {
        /// Period key (YYYYMM); defaults to the business date's month
        #[arg(long)]
        period: Option<String>,
    },
    /// Hand queued notifications to the dispatcher
    FlushNotifications,
    /// Close a dividend year, calculate the shares and credit them
    Dividends {
        /// Calendar year; defaults to the year before the business date
        #[arg(long)]
        year: Option<i32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = AppConfig::load().context("failed to load configuration")?;
    let as_of = match cli.date {
        Some(date) => date,
        None => Utc::now().with_timezone(&config.jobs.tz()?).date_naive(),
    };

    let db = connect_with(&config.database).await?;
    info!(%as_of, "connected to database");

    let jobs = Jobs { db, config, as_of };
    match cli.command {
        Command::Daily => jobs.daily().await,
        Command::Accrue => jobs.accrue().await,
        Command::Remind => jobs.remind().await,
        Command::Reconcile => jobs.reconcile().await,
        Command::OpenPeriod { period } => jobs.open_period(period.as_deref()).await,
        Command::FlushNotifications => jobs.flush().await,
        Command::Dividends { year } => jobs.dividends(year.unwrap_or(as_of.year() - 1)).await,
    }
}

fn init_tracing(json_logs: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coopbank=info".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();
}

struct Jobs {
    db: DatabaseConnection,
    config: AppConfig,
    as_of: NaiveDate,
}

impl Jobs {
    async fn daily(&self) -> anyhow::Result<ExitCode> {
        self.accrue().await?;
        self.remind().await?;
        self.flush().await
    }

    async fn accrue(&self) -> anyhow::Result<ExitCode> {
        let report = DelinquencyRepository::new(self.db.clone(), self.config.policy.clone())
            .sweep(self.as_of)
            .await?;
        print_json(&json!({ "job": "accrue", "as_of": self.as_of, "report": report }))?;
        Ok(ExitCode::SUCCESS)
    }

    async fn remind(&self) -> anyhow::Result<ExitCode> {
        let sent = DelinquencyRepository::new(self.db.clone(), self.config.policy.clone())
            .remind_due_soon(self.as_of)
            .await?;
        print_json(&json!({ "job": "remind", "as_of": self.as_of, "enqueued": sent }))?;
        Ok(ExitCode::SUCCESS)
    }

    async fn reconcile(&self) -> anyhow::Result<ExitCode> {
        let report = ReconciliationRepository::new(self.db.clone()).run().await?;
        print_json(&json!({ "job": "reconcile", "report": report }))?;
        if report.is_clean() {
            Ok(ExitCode::SUCCESS)
        } else {
            error!(mismatches = report.mismatches.len(), "ledgers out of balance");
            Ok(ExitCode::from(2))
        }
    }

    async fn open_period(&self, period: Option<&str>) -> anyhow::Result<ExitCode> {
        let key = match period {
            Some(raw) => PeriodKey::parse(raw)?,
            None => PeriodKey::containing(self.as_of)?,
        };
        let repo = FundRepository::new(self.db.clone(), self.config.policy.clone());
        match repo.open_period(key, SYSTEM_ACTOR).await {
            Ok(posting) => {
                print_json(&json!({ "job": "open-period", "fund": posting.fund }))?;
            }
            Err(RepositoryError::Fund(FundError::DuplicatePeriod(_))) => {
                info!(period = %key, "fund period already open");
            }
            Err(err) => return Err(err.into()),
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn flush(&self) -> anyhow::Result<ExitCode> {
        let policy = DeliveryPolicy {
            max_attempts: self.config.jobs.notification_max_attempts,
        };
        let report = NotificationRepository::new(self.db.clone())
            .flush(&LogDispatcher, policy, self.config.jobs.notification_batch_size)
            .await?;
        print_json(&json!({ "job": "flush-notifications", "report": report }))?;
        Ok(ExitCode::SUCCESS)
    }

    /// Resumes wherever an earlier run stopped.
    async fn dividends(&self, year: i32) -> anyhow::Result<ExitCode> {
        let repo = DividendRepository::new(self.db.clone(), self.config.policy.clone());
        let mut period = match repo.find_by_year(year).await? {
            Some(period) => period,
            None => repo.open_period(year, SYSTEM_ACTOR).await?,
        };

        if DividendPeriodStatus::from(period.status) == DividendPeriodStatus::Open {
            period = repo.close_period(period.id, None, SYSTEM_ACTOR).await?;
        }
        if DividendPeriodStatus::from(period.status) == DividendPeriodStatus::Distributed {
            info!(year, "dividends already distributed");
            return Ok(ExitCode::SUCCESS);
        }

        if repo.dividends(period.id).await?.is_empty() {
            let shares = repo.calculate(period.id, SYSTEM_ACTOR).await?;
            info!(year, members = shares.len(), "dividend shares calculated");
        }
        let report = repo.credit(period.id, SYSTEM_ACTOR).await?;
        print_json(&json!({ "job": "dividends", "year": year, "report": report }))?;

        if report.failed > 0 {
            error!(failed = report.failed, "some dividends could not be credited");
            return Ok(ExitCode::from(2));
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
