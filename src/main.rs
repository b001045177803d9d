use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use proxy_sift::engine::{
    run_batch, BatchConfig, BatchReport, CancelSignal, EndpointParser, FetcherConfig, ListFetcher,
    ListSource, ProgressSink, ProtocolKind, DEFAULT_ECHO_URL,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A concurrent proxy validation engine
#[derive(Parser)]
#[command(name = "proxy-sift")]
#[command(about = "Validate proxy lists by probing each endpoint through real requests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and deduplicate a proxy list without probing
    Parse {
        /// Input file containing host:port lines
        input: PathBuf,
        /// Output file for normalized endpoints
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch remote proxy lists and write the normalized endpoints
    Fetch {
        /// URLs to fetch lists from (can specify multiple)
        #[arg(short, long)]
        url: Vec<String>,
        /// Also fetch from the built-in free list sources
        #[arg(long)]
        default_sources: bool,
        /// Output file for fetched endpoints
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Timeout in seconds for each download
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
    /// Probe a proxy list and bucket the working endpoints
    Check {
        /// Input file containing host:port lines
        input: Option<PathBuf>,
        /// URLs to fetch candidate lists from (can specify multiple)
        #[arg(short = 'u', long)]
        url: Vec<String>,
        /// Directory to write one file per result bucket
        #[arg(short, long, default_value = "results")]
        output_dir: PathBuf,
        /// Comma-separated protocols to probe (http, https, socks4, socks5)
        #[arg(short, long, default_value = "http,socks4,socks5")]
        protocols: String,
        /// Number of concurrent probes
        #[arg(short = 'n', long, default_value = "50")]
        concurrency: usize,
        /// Per-probe timeout in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
        /// Echo endpoint requested through each proxy
        #[arg(long, default_value = DEFAULT_ECHO_URL)]
        echo_url: String,
        /// Also bucket working proxies by country
        #[arg(long)]
        country: bool,
        /// Path to a GeoLite2 country database
        #[arg(long)]
        mmdb: Option<String>,
        /// Print the full report as JSON instead of writing bucket files
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = parse_log_level(&cli.log_level)?;
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .with_module_level("proxy_sift", log_level)
        .init()?;

    match cli.command {
        Commands::Parse { input, output } => {
            let content = fs::read_to_string(&input)?;
            let report = EndpointParser::parse_str(&content);

            println!(
                "Parsed {} endpoints from {:?} ({} malformed lines skipped)",
                report.candidates.len(),
                input,
                report.skipped
            );

            let endpoints: Vec<String> =
                report.candidates.iter().map(|c| c.endpoint()).collect();
            if let Some(output_path) = output {
                fs::write(&output_path, endpoints.join("\n"))?;
                println!("Saved normalized endpoints to {:?}", output_path);
            } else {
                for endpoint in &endpoints {
                    println!("{}", endpoint);
                }
            }
        }
        Commands::Fetch {
            url,
            default_sources,
            output,
            timeout,
        } => {
            let mut sources: Vec<ListSource> =
                url.iter().map(|u| ListSource::new(u, u)).collect();
            if default_sources {
                sources.extend(ListFetcher::default_sources());
            }
            if sources.is_empty() {
                return Err(anyhow!(
                    "Nothing to fetch: pass --url or --default-sources"
                ));
            }

            let lines = fetch_lines(&sources, Duration::from_secs(timeout)).await?;
            let report = EndpointParser::parse(lines.iter().map(String::as_str));
            println!(
                "Fetched {} endpoints ({} malformed lines skipped)",
                report.candidates.len(),
                report.skipped
            );

            let endpoints: Vec<String> =
                report.candidates.iter().map(|c| c.endpoint()).collect();
            if let Some(output_path) = output {
                fs::write(&output_path, endpoints.join("\n"))?;
                println!("Saved fetched endpoints to {:?}", output_path);
            } else {
                for endpoint in &endpoints {
                    println!("{}", endpoint);
                }
            }
        }
        Commands::Check {
            input,
            url,
            output_dir,
            protocols,
            concurrency,
            timeout,
            echo_url,
            country,
            mmdb,
            json,
        } => {
            if input.is_none() && url.is_empty() {
                return Err(anyhow!(
                    "Nothing to check: pass an input file or at least one --url"
                ));
            }

            let mut lines: Vec<String> = Vec::new();
            if let Some(path) = &input {
                let content = fs::read_to_string(path)?;
                lines.extend(content.lines().map(str::to_string));
            }
            if !url.is_empty() {
                let sources: Vec<ListSource> =
                    url.iter().map(|u| ListSource::new(u, u)).collect();
                lines.extend(fetch_lines(&sources, Duration::from_secs(30)).await?);
            }

            let mut config = BatchConfig::new()
                .with_protocols(parse_protocols(&protocols)?)
                .with_concurrency(concurrency)
                .with_probe_timeout(Duration::from_secs(timeout))
                .with_echo_url(echo_url)
                .with_country_classification(country);
            if let Some(path) = mmdb {
                config = config.with_mmdb_path(path);
            }

            // Ctrl-C requests cooperative cancellation; in-flight probes
            // finish and the partial results are still written.
            let cancel = CancelSignal::new();
            let cancel_ctrlc = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                eprintln!("\nStopping after in-flight probes finish...");
                cancel_ctrlc.trigger();
            });

            let progress: ProgressSink = Arc::new(|processed, total| {
                let percent = if total > 0 { processed * 100 / total } else { 0 };
                eprintln!("Progress: {}/{} ({}%)", processed, total, percent);
                Ok(())
            });

            match run_batch(&lines, &config, Some(progress), cancel).await {
                Ok(report) => {
                    println!(
                        "Checked {} candidates ({} probes, {} lines skipped): {} working",
                        report.summary.total_candidates,
                        report.summary.total_probes_run,
                        report.summary.skipped_lines,
                        report.summary.total_successes
                    );

                    if json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        write_buckets(&report, &output_dir)?;
                    }
                }
                Err(e) => {
                    println!("Nothing to do: {}", e);
                }
            }
        }
    }

    Ok(())
}

/// Write each bucket to `<output_dir>/<key>.txt`, one endpoint per line
fn write_buckets(report: &BatchReport, output_dir: &Path) -> Result<()> {
    if report.buckets.is_empty() {
        println!("No working proxies found, nothing to write.");
        return Ok(());
    }

    fs::create_dir_all(output_dir)?;
    let mut keys: Vec<&String> = report.buckets.keys().collect();
    keys.sort();
    for key in keys {
        let entries = &report.buckets[key];
        let path = output_dir.join(format!("{}.txt", key));
        fs::write(&path, entries.join("\n"))?;
        println!("Saved {} proxies to {:?}", entries.len(), path);
    }
    Ok(())
}

/// Fetch every source, logging dead ones instead of failing the run
async fn fetch_lines(sources: &[ListSource], timeout: Duration) -> Result<Vec<String>> {
    let fetcher = ListFetcher::with_config(FetcherConfig::new().with_timeout(timeout))?;
    let mut lines = Vec::new();
    for result in fetcher.fetch_sources_with_results(sources).await {
        if result.is_success() {
            println!("Fetched {} lines from {}", result.lines.len(), result.source);
            lines.extend(result.lines);
        } else if let Some(error) = result.error {
            eprintln!("Error fetching {}: {}", result.source, error);
        }
    }
    Ok(lines)
}

fn parse_log_level(s: &str) -> Result<log::LevelFilter> {
    match s {
        "debug" => Ok(log::LevelFilter::Debug),
        "info" => Ok(log::LevelFilter::Info),
        "warn" => Ok(log::LevelFilter::Warn),
        "error" => Ok(log::LevelFilter::Error),
        _ => Err(anyhow!(
            "Invalid log level: {}. Use: debug, info, warn, error",
            s
        )),
    }
}

fn parse_protocols(s: &str) -> Result<Vec<ProtocolKind>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.to_lowercase().as_str() {
            "http" => Ok(ProtocolKind::Http),
            "https" => Ok(ProtocolKind::Https),
            "socks4" => Ok(ProtocolKind::Socks4),
            "socks5" => Ok(ProtocolKind::Socks5),
            _ => Err(anyhow!(
                "Invalid protocol: {}. Use: http, https, socks4, socks5",
                part
            )),
        })
        .collect()
}
