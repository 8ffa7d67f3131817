mod aggregate;
mod config;
mod error;
mod format;
mod ingest;
mod models;
mod pricing;
mod report;
mod service;
mod simulation;

use clap::{Parser, Subcommand, ValueEnum};
use config::{ensure_initialized, load_config, AppConfig};
use error::AppError;
use pricing::{
    default_capacity_tpm, final_ptu_price, known_models, load_pricing_file, ptu_price_option,
    resolve_pricing, PricingFile, PTU_PRICE_OPTIONS,
};
use service::{run_analysis, AnalysisRequest};
use simulation::sweep::SweepConfig;
use simulation::{NoopObserver, SweepObserver};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ptu-sim")]
#[command(about = "Compare PTU reserved capacity against PAYGO pricing using historical token usage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init,
    Models {
        #[arg(long)]
        pricing_file: Option<PathBuf>,
    },
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[derive(Debug, clap::Args)]
struct AnalyzeArgs {
    /// Usage CSV with timestamp, input tokens and output tokens columns.
    input: PathBuf,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    min_ptus: Option<u32>,
    #[arg(long)]
    max_ptus: Option<u32>,
    #[arg(long)]
    step: Option<u32>,
    #[arg(long)]
    capacity_tpm: Option<f64>,
    /// Defaults to the model's output/input price ratio.
    #[arg(long)]
    output_weight: Option<f64>,
    #[arg(long)]
    ptu_option: Option<String>,
    /// Base monthly price per PTU; overrides the pricing option.
    #[arg(long)]
    ptu_price: Option<f64>,
    #[arg(long)]
    discount: Option<f64>,
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long)]
    pricing_file: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
    /// Also write the CSV export to this path.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Print sweep progress to stderr.
    #[arg(long)]
    progress: bool,
}

struct ProgressPrinter;

impl SweepObserver for ProgressPrinter {
    fn on_status(&self, message: &str) {
        eprintln!("{message}");
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PTU_SIM_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn pricing_source(
    flag: Option<&Path>,
    cfg: &AppConfig,
) -> Result<Option<PricingFile>, AppError> {
    flag.or(cfg.pricing_file.as_deref())
        .map(load_pricing_file)
        .transpose()
}

fn build_request(
    args: &AnalyzeArgs,
    cfg: &AppConfig,
    pricing_file: Option<&PricingFile>,
) -> Result<AnalysisRequest, AppError> {
    let model = args.model.as_deref().unwrap_or(&cfg.default_model);
    let pricing = resolve_pricing(model, &cfg.pricing_overrides, pricing_file)?;

    let output_weight = match args.output_weight {
        Some(w) => w,
        None => pricing.output_weight()?,
    };
    let capacity_tpm_per_unit = args
        .capacity_tpm
        .or(cfg.sweep.capacity_tpm_per_unit)
        .unwrap_or_else(|| default_capacity_tpm(&pricing.model));

    let option_key = args
        .ptu_option
        .as_deref()
        .unwrap_or(&cfg.ptu_pricing.option);
    let option = ptu_price_option(option_key)?;
    let base_price = args
        .ptu_price
        .or(cfg.ptu_pricing.base_monthly_usd)
        .unwrap_or(option.monthly_usd);
    let discount = args.discount.unwrap_or(cfg.ptu_pricing.discount_pct);

    Ok(AnalysisRequest {
        sweep: SweepConfig {
            min_units: args.min_ptus.unwrap_or(cfg.sweep.min_units),
            max_units: args.max_ptus.unwrap_or(cfg.sweep.max_units),
            step: args.step.unwrap_or(cfg.sweep.step),
            capacity_tpm_per_unit,
            output_weight,
            workers: args.workers.unwrap_or(cfg.sweep.workers),
        },
        final_ptu_monthly_price: final_ptu_price(base_price, discount)?,
        pricing,
    })
}

fn analyze(args: &AnalyzeArgs) -> Result<(), AppError> {
    let cfg = load_config()?;
    let pricing_file = pricing_source(args.pricing_file.as_deref(), &cfg)?;
    let request = build_request(args, &cfg, pricing_file.as_ref())?;

    let ingest = ingest::read_usage_csv(&args.input)?;
    if ingest.dropped_rows > 0 {
        eprintln!(
            "Dropped {} of {} rows with invalid timestamps or token counts.",
            ingest.dropped_rows, ingest.total_rows
        );
    }

    let observer: &dyn SweepObserver = if args.progress {
        &ProgressPrinter
    } else {
        &NoopObserver
    };
    let report = run_analysis(&ingest.records, &request, observer)?;

    if let Some(path) = &args.output {
        fs::write(path, report::to_csv(&report.points))?;
        eprintln!("Wrote analysis results to {}", path.display());
    }

    match args.format {
        OutputFormat::Table => print!("{}", report::render_text(&report)),
        OutputFormat::Csv => print!("{}", report::to_csv(&report.points)),
        OutputFormat::Json => println!("{}", report::to_json(&report)?),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Commands::Init => {
            ensure_initialized()?;
            println!("Initialized ptu-sim config at {}", config::config_path()?.display());
        }
        Commands::Models { pricing_file } => {
            let cfg = load_config()?;
            let file = pricing_source(pricing_file.as_deref(), &cfg)?;
            println!("model,input_per_1k,output_per_1k,output_weight");
            for p in known_models(&cfg.pricing_overrides, file.as_ref()) {
                println!(
                    "{},{},{},{:.2}",
                    report::csv_field(&p.model),
                    p.input_per_1k,
                    p.output_per_1k,
                    p.output_weight()?
                );
            }
            println!();
            println!("ptu_option,label,monthly_usd");
            for o in PTU_PRICE_OPTIONS {
                println!("{},{},{:.2}", o.key, report::csv_field(o.label), o.monthly_usd);
            }
        }
        Commands::Analyze(args) => analyze(&args)?,
    }

    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
