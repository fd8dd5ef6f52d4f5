use chrono::NaiveDate;
use clap::Parser;
use qrz_logbook_client::{
    mask_api_key, ClientConfig, Completion, Error, QrzLogbookClient, QsoSummary,
};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "qrz-download",
    about = "Download all QSOs from a QRZ logbook (unofficial)"
)]
struct Cli {
    #[arg(env = "QRZ_API_KEY", hide_env_values = true, help = "QRZ Logbook API key")]
    api_key: String,

    #[arg(long, help = "Only fetch QSOs modified since this date (YYYY-MM-DD)")]
    since: Option<NaiveDate>,

    #[arg(long, help = "TOML file overriding client settings")]
    config: Option<String>,

    #[arg(long, help = "Records per FETCH request")]
    page_size: Option<usize>,

    #[arg(long, default_value = "info", help = "trace, debug, info, warn or error")]
    log_level: String,

    #[arg(long, help = "Print the fetched QSOs as JSON on stdout")]
    json: bool,
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" | "debug" | "info" | "warn" | "error" => level,
        _ => "info",
    };
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .unwrap_or_else(|_| LevelFilter::INFO.into()),
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Error: {}", e);
            if e.is_auth() {
                tracing::error!("Check the API key and the QRZ logbook subscription");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Error> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size;
    }

    tracing::info!("API key: {}", mask_api_key(&cli.api_key));
    let client = QrzLogbookClient::new(cli.api_key.clone(), Some(config))?;

    let status = client.validate_api_key().await?;
    tracing::info!("Authenticated as: {}", status.callsign);
    tracing::info!("Book ID: {}", status.book_id.as_deref().unwrap_or("N/A"));
    tracing::info!("QSO count (from STATUS): {}", status.qso_count);
    tracing::info!("Confirmed count: {}", status.confirmed_count);

    tracing::info!("Starting QSO download...");
    let started = Instant::now();
    let outcome = client.fetch_qsos(cli.since).await?;

    tracing::info!("Total QSOs fetched: {}", outcome.qsos.len());
    tracing::info!("Total time: {:.1}s", started.elapsed().as_secs_f64());
    if cli.since.is_none() && outcome.qsos.len() as u64 != status.qso_count {
        tracing::warn!(
            "Mismatch: fetched {} but STATUS reported {}",
            outcome.qsos.len(),
            status.qso_count
        );
    }
    for anomaly in &outcome.anomalies {
        tracing::debug!("Anomaly: {:?}", anomaly);
    }

    if cli.json {
        match serde_json::to_string_pretty(&outcome.qsos) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!("Failed to encode QSOs as JSON: {}", e),
        }
    } else {
        print_summary(&QsoSummary::from_qsos(&outcome.qsos));
    }

    match outcome.completion {
        Completion::Complete => Ok(ExitCode::SUCCESS),
        Completion::Stalled { page, after_log_id } => {
            tracing::warn!(
                "Download stopped early at page {} (afterLogId={}); results are partial",
                page,
                after_log_id
            );
            Ok(ExitCode::from(2))
        }
    }
}

fn print_summary(summary: &QsoSummary) {
    if summary.total == 0 {
        println!("No QSOs to analyze.");
        return;
    }
    println!("QSO analysis ({} total)", summary.total);
    if let (Some(first), Some(last)) = (summary.earliest, summary.latest) {
        println!("Date range: {} to {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d"));
    }
    if summary.undated > 0 {
        println!("Undated: {}", summary.undated);
    }
    println!("Bands:");
    for (band, count) in &summary.bands {
        println!("  {band}: {count}");
    }
    println!("Modes:");
    for (mode, count) in &summary.modes {
        println!("  {mode}: {count}");
    }
    println!("Sample QSOs (first {}):", summary.samples.len());
    for q in &summary.samples {
        let when = q
            .timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "----------------".into());
        println!("  {} {:10} {:6} {}", when, q.callsign, q.band, q.mode);
    }
}
