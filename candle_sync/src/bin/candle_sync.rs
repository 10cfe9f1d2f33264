use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use candle_ingestor::{
    models::{granularity::Granularity, instrument::Instrument},
    providers::oanda_rest::OandaProvider,
    requests::historical::ParallelFetcher,
    time::parse_date_time,
};
use candle_sync::{
    config::SyncConfig,
    store::{CandleStore, SqliteCandleStore},
    sync::{CandleSync, SyncOutcome},
};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use shared_utils::env::get_env_var;
use tokio::sync::Semaphore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "candle-sync", version, about = "Fetch OANDA candles into SQLite")]
struct Cli {
    /// TOML config file; built-in defaults apply without it.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Fetch a date range for one pair.
    Fetch {
        #[arg(long)]
        instrument: String,
        #[arg(long)]
        granularity: Granularity,
        /// Range start, DD/MM/YYYY HH:MM:SS (UTC).
        #[arg(long)]
        from: String,
        /// Range end; defaults to now.
        #[arg(long)]
        to: Option<String>,
    },
    /// Fetch the most recent candles for one pair.
    Latest {
        #[arg(long)]
        instrument: String,
        #[arg(long)]
        granularity: Granularity,
        #[arg(long)]
        count: u32,
    },
    /// Run every pair of the config's [job] section.
    Sync,
    /// List the candle tables in the database.
    Tables,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::load(cli.config.as_deref())?;

    let store = Arc::new(
        SqliteCandleStore::open(&config.database.path, config.database.batch_size)
            .with_context(|| format!("opening {}", config.database.path))?,
    );

    if let Cmd::Tables = cli.cmd {
        for table in store.list_tables()? {
            println!(
                "{}\t{}\t{}\t{}",
                table.name, table.instrument, table.granularity, table.created_at
            );
        }
        return Ok(());
    }

    let token = SecretString::new(get_env_var("API_KEY")?.into());
    let provider = Arc::new(OandaProvider::new(config.oanda_config(token))?);
    let admission = Arc::new(Semaphore::new(config.fetch.max_in_flight.get()));
    let fetcher = ParallelFetcher::new(provider, admission, config.fetch_options());
    let pipeline = Arc::new(CandleSync::new(fetcher, store));

    match cli.cmd {
        Cmd::Fetch {
            instrument,
            granularity,
            from,
            to,
        } => {
            let from = parse_date_time(&from)?;
            let to = to.as_deref().map(parse_date_time).transpose()?;
            let instrument = Instrument::from(instrument);
            let outcome = pipeline
                .fetch_and_store(&instrument, granularity, from, to)
                .await?;
            print_outcome(&outcome);
        }
        Cmd::Latest {
            instrument,
            granularity,
            count,
        } => {
            let instrument = Instrument::from(instrument);
            let outcome = pipeline.fetch_latest(&instrument, granularity, count).await?;
            print_outcome(&outcome);
        }
        Cmd::Sync => {
            let job = config.sync_job()?;
            let report = job.run(Arc::clone(&pipeline)).await;
            for (pair, result) in &report.outcomes {
                match result {
                    Ok(outcome) => println!("{pair}: {} new of {} candles", outcome.inserted, outcome.fetched),
                    Err(e) => println!("{pair}: FAILED {e}"),
                }
            }
            info!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                "sync done"
            );
            if report.failed() > 0 {
                anyhow::bail!("{} of {} pairs failed", report.failed(), report.outcomes.len());
            }
        }
        Cmd::Tables => {}
    }

    Ok(())
}

fn print_outcome(outcome: &SyncOutcome) {
    println!(
        "{}: {} new of {} candles ({} of {} requests failed)",
        outcome.table, outcome.inserted, outcome.fetched, outcome.failed_chunks, outcome.planned_chunks
    );
}
