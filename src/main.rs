// src/main.rs

//! gridwatch: disconnection-schedule watcher CLI
//!
//! Polls a utility site's disconnection schedules for subscribed
//! addresses and reports changes for "today" and "tomorrow".

use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};

use gridwatch::error::Result;
use gridwatch::fetch::Fetcher;
use gridwatch::models::Config;
use gridwatch::notify::LogSink;
use gridwatch::parser::parse_schedule;
use gridwatch::render::{ScheduleRenderer, TextRenderer};
use gridwatch::storage::LocalStore;
use gridwatch::worker::Worker;

#[derive(Parser, Debug)]
#[command(
    name = "gridwatch",
    version,
    about = "Electricity-disconnection schedule watcher"
)]
struct Cli {
    #[arg(short, long, default_value = "data/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

/// CLI Commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the notification worker loop
    Watch,
    /// Fetch and print the schedule for an address once
    Schedule {
        city_id: i64,
        street_id: i64,
        house_id: i64,
        /// Print the parsed structure as JSON instead of rendered text
        #[arg(long)]
        json: bool,
    },
    /// Resolve ids through the site's autocomplete
    Resolve {
        #[command(subcommand)]
        target: ResolveTarget,
    },
    /// Validate the configuration file
    Validate,
}

#[derive(Subcommand, Debug)]
enum ResolveTarget {
    /// Look up cities by name
    City { query: String },
    /// Look up streets of a city by name
    Street { city_id: i64, query: String },
    /// Look up houses of a street by number
    House { street_id: i64, query: String },
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config);

    env_logger::Builder::new()
        .parse_filters(&config.logging.level)
        .init();

    match cli.command {
        Command::Watch => run_watch(&config).await?,
        Command::Schedule {
            city_id,
            street_id,
            house_id,
            json,
        } => run_schedule(&config, city_id, street_id, house_id, json).await?,
        Command::Resolve { target } => run_resolve(&config, target).await?,
        Command::Validate => {
            config.validate()?;
            println!("Configuration OK");
        }
    }

    Ok(())
}

/// Run the worker until Ctrl-C.
async fn run_watch(config: &Config) -> Result<()> {
    config.validate()?;

    let fetcher = Arc::new(Fetcher::new(config)?);
    let store = Arc::new(LocalStore::open(&config.storage.path).await?);
    let worker = Worker::new(
        fetcher,
        store,
        Arc::new(LogSink),
        Arc::new(TextRenderer),
        config.worker.clone(),
    );

    log::info!(
        "Watching subscribed addresses every {}s",
        config.worker.interval_secs
    );

    tokio::select! {
        _ = worker.run() => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutting down");
        }
    }

    Ok(())
}

/// One-shot fetch+parse for a single address.
async fn run_schedule(
    config: &Config,
    city_id: i64,
    street_id: i64,
    house_id: i64,
    json: bool,
) -> Result<()> {
    let fetcher = Fetcher::new(config)?;
    let markup = fetcher.schedule_markup(city_id, street_id, house_id).await?;

    let address = format!("{city_id}-{street_id}-{house_id}");
    let today = Local::now().date_naive();
    let schedule = parse_schedule(&markup, &address, config.worker.max_days, today);

    if json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
        return Ok(());
    }

    if schedule.is_empty() {
        println!("{}", schedule.disconnection_queue);
        return Ok(());
    }
    for day in &schedule.disconnections {
        let rendered = TextRenderer.render_day(
            Some(day),
            schedule.current_disconnection.as_ref(),
            &schedule.disconnection_queue,
            day.date,
            &schedule.address_name,
        );
        println!("{rendered}\n");
    }

    Ok(())
}

/// Autocomplete lookups for building an address id.
async fn run_resolve(config: &Config, target: ResolveTarget) -> Result<()> {
    let fetcher = Fetcher::new(config)?;

    let items = match target {
        ResolveTarget::City { query } => fetcher.autocomplete_cities(&query).await?,
        ResolveTarget::Street { city_id, query } => {
            fetcher.autocomplete_streets(city_id, &query).await?
        }
        ResolveTarget::House { street_id, query } => {
            fetcher.autocomplete_houses(street_id, &query).await?
        }
    };

    if items.is_empty() {
        println!("No matches");
        return Ok(());
    }
    for item in items {
        println!("{}\t{}", item.id, item.name);
    }

    Ok(())
}
