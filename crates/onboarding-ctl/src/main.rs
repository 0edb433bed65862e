// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Onboarding worker CLI.
//!
//! Runs merchant onboarding processes against a SQLite database:
//! - `start` begins onboarding and drives it to an outcome
//! - `signal` submits a document from another shell
//! - `resume` continues everything left in flight by a stopped worker
//! - `status` and `history` inspect persisted records and journals

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use durable_runtime::{Runtime, SqlitePersistence};
use onboarding_workflows::MerchantInfo;

mod commands;
mod config;

use commands::Submission;
use config::Config;

/// Merchant compliance onboarding worker
#[derive(Parser)]
#[command(name = "onboarding-ctl")]
#[command(about = "Merchant compliance onboarding worker", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start onboarding for a merchant and run it to its outcome
    Start(StartArgs),

    /// Submit an identity document to a running onboarding
    Signal {
        #[arg(long, default_value = "MERCH-001")]
        merchant_id: String,

        #[arg(long)]
        document_id: String,
    },

    /// Resume every in-flight onboarding
    Resume,

    /// Show the persisted onboarding and KYC records
    Status {
        #[arg(long, default_value = "MERCH-001")]
        merchant_id: String,
    },

    /// Show the recorded journal of an onboarding and its KYC child
    History {
        #[arg(long, default_value = "MERCH-001")]
        merchant_id: String,
    },
}

#[derive(Args)]
struct StartArgs {
    #[arg(long, default_value = "MERCH-001")]
    merchant_id: String,

    #[arg(long, default_value = "Acme Online Store")]
    name: String,

    #[arg(long, default_value = "onboarding@acme-store.com")]
    email: String,

    #[arg(long, default_value = "NL")]
    country: String,

    #[arg(long, default_value = "ecommerce")]
    business_type: String,

    /// Document id to submit while the onboarding runs
    #[arg(long)]
    submit_document: Option<String>,

    /// Onboarding day on which the document is submitted
    #[arg(long, default_value_t = 10)]
    submit_after_days: u32,

    /// Print the onboarding status every N days
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    status_every_days: Option<u32>,
}

impl StartArgs {
    fn merchant(&self) -> MerchantInfo {
        MerchantInfo {
            merchant_id: self.merchant_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            country: self.country.clone(),
            business_type: self.business_type.clone(),
        }
    }

    fn submission(&self) -> Option<Submission> {
        self.submit_document.as_ref().map(|document_id| Submission {
            document_id: document_id.clone(),
            after_days: self.submit_after_days,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()
        .inspect_err(|e| error!("Configuration error: {}", e))
        .context("failed to load configuration")?;

    info!(
        database = %config.database_path.display(),
        day_length_ms = config.timeline.day_length().as_millis() as u64,
        poll_interval_ms = config.signal_poll_interval.as_millis() as u64,
        supplier_fault_rate = config.supplier_fault_rate,
        "Configuration loaded"
    );

    let persistence = Arc::new(
        SqlitePersistence::from_path(&config.database_path)
            .await
            .context("failed to open onboarding database")?,
    );

    let runtime = Runtime::builder()
        .persistence(persistence.clone())
        .signal_poll_interval(config.signal_poll_interval)
        .build()
        .context("failed to build runtime")?;

    let result = match &cli.command {
        Command::Start(args) => {
            commands::start(
                &runtime,
                &config,
                args.merchant(),
                args.submission(),
                args.status_every_days,
            )
            .await
        }
        Command::Signal {
            merchant_id,
            document_id,
        } => commands::signal(&runtime, merchant_id, document_id).await,
        Command::Resume => commands::resume(&runtime, &config).await,
        Command::Status { merchant_id } => {
            commands::status(persistence.as_ref(), merchant_id).await
        }
        Command::History { merchant_id } => {
            commands::history(persistence.as_ref(), merchant_id).await
        }
    };

    persistence.pool().close().await;
    result
}
