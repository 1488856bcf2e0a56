//! Load test CLI for GraphHopper-compatible routing services.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use route_load_test::{preflight, report, HttpRouteClient, LoadRunner, ResultsReport, RunConfig, RunSettings};

#[derive(Parser)]
#[command(name = "route-load-test")]
#[command(about = "Load testing tool for GraphHopper-compatible routing services", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Shortcut for --log-level debug
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load test
    Run {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Console summary format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Don't open the HTML report when done
        #[arg(long)]
        no_open: bool,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Only run the connectivity and center point checks
    Check {
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// List available scenarios
    List {
        /// Scenarios directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

/// Flags that override the scenario file (or the built-in defaults).
#[derive(Args)]
struct SettingsArgs {
    /// Path to a scenario YAML file
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Routing server URL
    #[arg(short, long, env = "ROUTING_URL")]
    url: Option<String>,

    /// Center point latitude,longitude. Examples: London(51.5074,-0.1278), Berlin(52.5200,13.4050), NYC(40.7128,-74.0060)
    #[arg(short, long, allow_hyphen_values = true)]
    center: Option<String>,

    /// Test duration in minutes
    #[arg(short, long)]
    duration: Option<f64>,

    /// Worker start interval in minutes
    #[arg(short, long)]
    interval: Option<f64>,

    /// Delay between requests of one worker, in milliseconds
    #[arg(short, long)]
    request_delay: Option<u64>,

    /// Target radius in kilometers
    #[arg(short, long)]
    target_radius: Option<f64>,

    /// Source radius minimum in kilometers
    #[arg(short = 's', long)]
    source_radius_min: Option<f64>,

    /// Source radius maximum in kilometers
    #[arg(short = 'S', long)]
    source_radius_max: Option<f64>,

    /// Output HTML file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disable route instructions in requests
    #[arg(long)]
    no_instructions: bool,

    /// Test name to display in the report
    #[arg(short, long)]
    name: Option<String>,

    /// Skip checking that the center point is routable
    #[arg(long)]
    skip_validation: bool,

    /// RNG seed for reproducible coordinates
    #[arg(long)]
    seed: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl SettingsArgs {
    /// Load the scenario (if any), apply overrides and validate.
    fn into_config(self) -> Result<RunConfig> {
        let mut settings = match &self.scenario {
            Some(path) => RunSettings::from_file(path)?,
            None => RunSettings::default(),
        };

        if let Some(url) = self.url {
            settings.url = url;
        }
        if let Some(center) = self.center {
            settings.center = center;
        }
        if let Some(d) = self.duration {
            settings.duration_minutes = d;
        }
        if let Some(i) = self.interval {
            settings.start_interval_minutes = i;
        }
        if let Some(r) = self.request_delay {
            settings.request_delay_ms = r;
        }
        if let Some(t) = self.target_radius {
            settings.target_radius_km = t;
        }
        if let Some(min) = self.source_radius_min {
            settings.source_radius_min_km = min;
        }
        if let Some(max) = self.source_radius_max {
            settings.source_radius_max_km = max;
        }
        if let Some(output) = self.output {
            settings.output = output;
        }
        if self.no_instructions {
            settings.include_instructions = false;
        }
        if let Some(name) = self.name {
            settings.name = Some(name);
        }
        if self.skip_validation {
            settings.validate_center = false;
        }
        if let Some(seed) = self.seed {
            settings.seed = Some(seed);
        }
        if let Some(timeout) = self.timeout {
            settings.request_timeout_secs = timeout;
        }

        let config = settings.validate()?.with_timestamped_output(chrono::Local::now());
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Commands::Run {
            settings,
            format,
            no_open,
            no_progress,
        } => {
            let config = settings.into_config()?;
            print_configuration(&config);

            let client = Arc::new(HttpRouteClient::new(&config)?);
            preflight::check_connectivity(client.as_ref()).await;
            ensure_center_routable(client.as_ref(), &config).await?;

            info!("Starting load test, press Ctrl+C to stop early");
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Received shutdown signal, stopping load test");
                ctrl_c.cancel();
            });

            let runner = LoadRunner::new(config, client).with_progress(!no_progress);
            let stats = runner.run(cancel).await?;
            let config = runner.config();

            ResultsReport::write_html(&stats, config)?;

            match format {
                OutputFormat::Json => println!("{}", ResultsReport::format_json(&stats)?),
                OutputFormat::Table => println!("{}", ResultsReport::format_table(&stats, config)),
            }

            let full_path = std::fs::canonicalize(config.output_path())?;
            info!(path = %full_path.display(), "Load test completed, results saved");

            if !no_open {
                if let Err(e) = report::open_in_browser(&full_path) {
                    warn!(error = %e, path = %full_path.display(), "Failed to open report in browser, open it manually");
                }
            }

            Ok(())
        }
        Commands::Check { settings } => {
            let config = settings.into_config()?;
            let client = HttpRouteClient::new(&config)?;

            let healthy = preflight::check_connectivity(&client).await;
            ensure_center_routable(&client, &config).await?;

            if healthy {
                println!("✓ Connectivity test passed");
            } else {
                println!("✗ Connectivity test failed (health endpoint unreachable)");
            }
            if config.validate_center() {
                println!("✓ Center point {} is routable", config.center());
            }
            Ok(())
        }
        Commands::List { dir } => list_scenarios(&dir),
    }
}

fn list_scenarios(dir: &Path) -> Result<()> {
    println!("Available scenarios in {}:", dir.display());
    println!();

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read {}, make sure the directory exists", dir.display()))?;

    let mut scenarios = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("yaml") {
            continue;
        }
        match RunSettings::from_file(&path) {
            Ok(settings) => scenarios.push((entry.file_name().to_string_lossy().to_string(), settings)),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable scenario"),
        }
    }
    scenarios.sort_by(|a, b| a.0.cmp(&b.0));

    if scenarios.is_empty() {
        println!("No scenario files found");
    }
    for (filename, settings) in scenarios {
        println!("  {} - {}", filename, settings.name.as_deref().unwrap_or("(unnamed)"));
        if let Some(desc) = settings.description {
            println!("    {}", desc);
        }
        println!("    center {}, {} min, new worker every {} min", settings.center, settings.duration_minutes, settings.start_interval_minutes);
        println!();
    }
    Ok(())
}

async fn ensure_center_routable(client: &HttpRouteClient, config: &RunConfig) -> Result<()> {
    if config.validate_center() && !preflight::validate_center(client, config).await {
        bail!(
            "center point validation failed: {} may not have routing data. \
             Try coordinates in a well-connected urban area, or pass --skip-validation",
            config.center()
        );
    }
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_configuration(config: &RunConfig) {
    let (min_km, max_km) = config.source_radius_km();

    println!("Routing Load Test");
    println!("=================");
    if let Some(name) = config.name() {
        println!("  Test Name: {}", name);
    }
    println!("  Server URL: {}", config.base_url());
    println!("  Center Point: {}", config.center());
    println!("  Test Duration: {:.1} minutes", config.duration().as_secs_f64() / 60.0);
    println!("  Worker Start Interval: {:.1} minute(s)", config.start_interval().as_secs_f64() / 60.0);
    println!("  Request Delay: {}ms", config.request_delay().as_millis());
    println!("  Target Radius: {}km", config.target_radius_km());
    println!("  Source Radius: {}-{}km", min_km, max_km);
    println!("  Include Instructions: {}", config.include_instructions());
    println!("  Output File: {}", config.output_path().display());
    println!();
    println!("Note: use center coordinates in well-connected urban areas with map coverage.");
    println!("Remote areas and water bodies make most requests fail.");
    println!();
}
