use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use loan_portfolio::logging::init_logging;
use loan_portfolio::{encode, load_table, ExtractFormat, ExtractStore, PortfolioConfig, PortfolioPipeline};

#[derive(Parser)]
#[command(name = "loan-portfolio", version, about = "Build the cleaned loan portfolio extract")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "LOAN_PORTFOLIO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Extract file format
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Xlsx,
    Csv,
}

impl From<OutputFormat> for ExtractFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Xlsx => ExtractFormat::Xlsx,
            OutputFormat::Csv => ExtractFormat::Csv,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline over the three exports and save the extract
    Process {
        /// Loan portfolio export
        #[arg(long)]
        loans: PathBuf,
        /// ARC Finance export
        #[arg(long)]
        arc: PathBuf,
        /// LMS053 voucher MIS export
        #[arg(long)]
        ledger: PathBuf,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "xlsx")]
        format: OutputFormat,
        /// Print the pipeline report as JSON
        #[arg(long)]
        report: bool,
    },
    /// Print the path of the most recent extract
    Latest {
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() {
    init_logging();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = PortfolioConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Process {
            loans,
            arc,
            ledger,
            output_dir,
            format,
            report,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            run_process(&config, &loans, &arc, &ledger, format.into(), report)
        }
        Command::Latest { output_dir } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            run_latest(&config)
        }
    }
}

fn run_process(
    config: &PortfolioConfig,
    loans_path: &Path,
    arc_path: &Path,
    ledger_path: &Path,
    format: ExtractFormat,
    print_report: bool,
) -> Result<()> {
    println!("🏦 Loan Portfolio - Process Files");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load inputs
    println!("\n📂 Loading exports...");
    let loans = load_table(loans_path).context("Loan Portfolio file")?;
    let arc = load_table(arc_path).context("ARC Finance file")?;
    let ledger = load_table(ledger_path).context("LMS053 Voucher MIS file")?;
    println!(
        "✓ {} loan rows, {} ARC rows, {} ledger rows",
        loans.row_count(),
        arc.row_count(),
        ledger.row_count()
    );

    // 2. Run pipeline
    println!("\n🔗 Running pipeline...");
    let output = PortfolioPipeline::new().run(&loans, &arc, &ledger)?;
    println!("✓ {}", output.report.summary());

    // 3. Save extract
    println!("\n💾 Saving extract...");
    let bytes = encode(&output.table, format, &config.sheet_name)?;
    let store = ExtractStore::from_config(config);
    println!("✓ Output directory: {}", store.dir().display());
    let path = store.save(&bytes, format)?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ File processed and saved as {}", path.display());

    if print_report {
        println!("{}", serde_json::to_string_pretty(&output.report)?);
    }

    Ok(())
}

fn run_latest(config: &PortfolioConfig) -> Result<()> {
    match ExtractStore::from_config(config).latest()? {
        Some(path) => println!("{}", path.display()),
        None => println!("No file has been uploaded yet."),
    }
    Ok(())
}
