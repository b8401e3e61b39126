// metar_qam - METAR poller that keeps a change history and renders QAM weather bulletins
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use chrono::Utc;
use clap::Parser;
use metar_qam::client::{ClientError, NoaaMetarClient};
use metar_qam::history::{CsvHistory, HistoryStore};
use metar_qam::http::{RequestContext, RECENT_HISTORY_ROWS};
use metar_qam::metrics::ReportMetrics;
use metar_qam::parse::{parse_report, parse_trend};
use metar_qam::poll::{process_report, PollOutcome, Update};
use metar_qam::render::Report;
use prometheus_client::registry::Registry;
use reqwest::{Client, Url};
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tracing::{Instrument, Level};

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 9783);
const DEFAULT_REFERSH_SECS: u64 = 60;
const DEFAULT_TIMEOUT_MILLIS: u64 = 10000;
const DEFAULT_API_URL: &str = "https://tgftp.nws.noaa.gov/";
const DEFAULT_STATION: &str = "WARR";
const DEFAULT_HISTORY_FILE: &str = "metar_history.csv";

#[derive(Debug, Parser)]
#[clap(name = "metar_qam", version = clap::crate_version!())]
struct MetarQamApplication {
    /// Four letter ICAO code of the aerodrome to fetch reports for
    #[clap(long, default_value = DEFAULT_STATION, value_parser = parse_station)]
    station: String,

    /// Base URL for the NOAA station files
    #[clap(long, default_value = DEFAULT_API_URL)]
    api_url: Url,

    /// CSV file that new observations are appended to
    #[clap(long, default_value = DEFAULT_HISTORY_FILE)]
    history_file: PathBuf,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Fetch reports from NOAA at this interval, in seconds.
    #[clap(long, default_value_t = DEFAULT_REFERSH_SECS)]
    refresh_secs: u64,

    /// Timeout for fetching reports from NOAA, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_MILLIS)]
    timeout_millis: u64,

    /// Address to bind to. By default, metar_qam will bind to public address since
    /// the purpose is to expose metrics and bulletins to external systems.
    #[clap(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,

    /// Run a single poll cycle, print the update message if there was a new
    /// observation, and exit.
    #[clap(long)]
    once: bool,
}

fn parse_station(s: &str) -> Result<String, String> {
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(s.to_ascii_uppercase())
    } else {
        Err(format!("station must be four letters, got '{}'", s))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = MetarQamApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let timeout = Duration::from_millis(opts.timeout_millis);
    let http_client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let client = NoaaMetarClient::new(http_client, opts.api_url.clone());
    let mut history = CsvHistory::new(opts.history_file.clone());
    let mut registry = Registry::default();
    let metrics = ReportMetrics::new(&mut registry);
    let station = opts.station.clone();

    if opts.once {
        if let Some(update) = poll(&client, &mut history, &station, &metrics).await {
            println!("{}", update.report.message());
        }

        return Ok(());
    }

    let context = Arc::new(RequestContext::new(registry));
    match history.recent(&station, RECENT_HISTORY_ROWS) {
        Ok(recent) if !recent.is_empty() => {
            if let Some(entry) = recent.last() {
                let record = parse_report(&entry.raw_report);
                let trend = parse_trend(&entry.raw_report);
                context.set_report(Report::new(&record, trend.as_ref(), Utc::now())).await;
                tracing::info!(message = "loaded latest stored observation", station = %station, time = %entry.observed_time);
            }
            context.set_recent(recent).await;
        }
        Ok(_) => {
            tracing::info!(message = "no stored observations", station = %station, path = %history.path().display());
        }
        Err(e) => {
            tracing::error!(message = "unable to read history", path = %history.path().display(), error = %e);
            process::exit(1)
        }
    }

    let poll_context = context.clone();
    let api_url = opts.api_url.clone();
    let mut interval = tokio::time::interval(Duration::from_secs(opts.refresh_secs));

    tokio::spawn(async move {
        tracing::info!(message = "report polling started", api_url = %api_url, station = %station);

        loop {
            let _ = interval.tick().await;
            if let Some(update) = poll(&client, &mut history, &station, &metrics)
                .instrument(tracing::span!(Level::DEBUG, "metar_poll"))
                .await
            {
                tracing::info!(message = "new observation", station = %station, metar = %update.entry.raw_report);
                poll_context.set_report(update.report).await;

                match history.recent(&station, RECENT_HISTORY_ROWS) {
                    Ok(recent) => poll_context.set_recent(recent).await,
                    Err(e) => {
                        tracing::error!(message = "unable to read history", path = %history.path().display(), error = %e)
                    }
                }
            }
        }
    });

    let server = axum::Server::try_bind(&opts.bind).unwrap_or_else(|e| {
        tracing::error!(message = "error binding to address", address = %opts.bind, error = %e);
        process::exit(1)
    });

    tracing::info!(message = "server started", address = %opts.bind);
    server
        .serve(metar_qam::http::app(context).into_make_service())
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Fetch, compare, and store one report, returning the update if it was new.
async fn poll<H: HistoryStore>(
    client: &NoaaMetarClient,
    history: &mut H,
    station: &str,
    metrics: &ReportMetrics,
) -> Option<Box<Update>> {
    metrics.poll(station);

    let raw = match client.latest_report(station).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::warn!(message = "no report available", station = %station);
            return None;
        }
        Err(ClientError::InvalidStation(s)) => {
            metrics.fetch_error(station);
            tracing::error!(message = "invalid station", station = %s);
            return None;
        }
        Err(e) => {
            metrics.fetch_error(station);
            tracing::error!(message = "failed to fetch report", station = %station, error = %e);
            return None;
        }
    };

    match process_report(history, station, &raw, Utc::now()) {
        Ok(PollOutcome::Updated(update)) => {
            metrics.observation(station, &update.record);
            Some(update)
        }
        Ok(PollOutcome::Unchanged) => None,
        Err(e) => {
            tracing::error!(message = "failed to update history", station = %station, error = %e);
            None
        }
    }
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
