use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ipmon::config::{self, CliOverrides, Config, RuntimeParams};
use ipmon::db;
use ipmon::monitor::{self, Monitor};
use ipmon::notifications::service::{down_message, up_message, NotificationService};
use ipmon::probe::{Prober, SystemProber};

/// Batch reachability monitor for IPs and URLs.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default log level filter (RUST_LOG overrides)
    #[arg(short = 'l', long, default_value = "warn")]
    log_level: String,

    /// Internet pre-check timeout in seconds
    #[arg(long)]
    precheck_timeout: Option<f64>,

    /// Force the internet pre-check on (the default)
    #[arg(long, conflicts_with = "no_precheck")]
    precheck: bool,

    /// Disable the internet pre-check
    #[arg(long)]
    no_precheck: bool,

    /// Timeout in seconds for one monitored-IP ping
    #[arg(long)]
    ping_timeout: Option<f64>,

    /// Total HTTP timeout in seconds for URL checks
    #[arg(long)]
    http_timeout: Option<f64>,

    /// Maximum simultaneous HTTP connections
    #[arg(long)]
    http_connector_limit: Option<usize>,

    /// Maximum concurrent checks (IP + URL)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Suppress progress messages on standard output
    #[arg(long, conflicts_with = "no_quiet")]
    quiet: bool,

    /// Force progress messages on standard output (the default)
    #[arg(long)]
    no_quiet: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            precheck_timeout: self.precheck_timeout,
            ping_timeout: self.ping_timeout,
            http_timeout: self.http_timeout,
            http_connector_limit: self.http_connector_limit,
            concurrency: self.concurrency,
            precheck_enabled: tri_state(self.precheck, self.no_precheck),
            quiet: tri_state(self.quiet, self.no_quiet),
        }
    }
}

fn tri_state(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn init_logging(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},sqlx::query=warn")));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);
    dotenv::dotenv().ok();

    let config_path = config::discover_config_path(args.config.clone());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    let params = config::resolve_params(&args.overrides(), &config);

    if !params.quiet {
        println!(
            "Config: {} (IPs: {}, URLs: {}, concurrency: {})",
            config_path.display(),
            config.ips.len(),
            config.urls.len(),
            params.concurrency
        );
    }

    if let Err(e) = run(&config, &params).await {
        error!(error = %e, "run failed");
        process::exit(1);
    }
}

async fn run(
    config: &Config,
    params: &RuntimeParams,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let http = reqwest::Client::builder()
        .timeout(params.http_timeout)
        .pool_max_idle_per_host(params.http_connector_limit)
        .build()?;
    let channel = config.channel()?;
    let prober: Arc<dyn Prober> = Arc::new(SystemProber::new(http.clone()));

    if params.precheck_enabled
        && !monitor::precheck_internet(prober.as_ref(), params.precheck_timeout, params.quiet)
            .await
    {
        return Ok(());
    }

    // Store open failures are the only fatal storage errors; everything
    // later is contained per task.
    let pool = db::open_store(&config.db_path).await?;

    let monitor = Monitor::new(pool.clone(), Arc::clone(&prober), params.clone());
    let outcome = tokio::select! {
        result = monitor.run(config) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt requested, stopping");
            pool.close().await;
            return Err("interrupted".into());
        }
    };

    // State is already committed: a failed send cannot double-notify on
    // the next run.
    let timestamp = chrono::Local::now().format("%a %d/%m/%Y at %R").to_string();
    let notifier = NotificationService::new(channel, http);
    if !outcome.down.is_empty() {
        notifier.dispatch(&down_message(&outcome.down, &timestamp)).await;
    }
    if !outcome.up.is_empty() {
        notifier.dispatch(&up_message(&outcome.up, &timestamp)).await;
    }

    if !params.quiet {
        println!("Done: {} down, {} up.", outcome.down.len(), outcome.up.len());
    }

    pool.close().await;
    Ok(())
}
