use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use pos_reconciler::app::ports::TableSourcePort;
use pos_reconciler::app::reconcile_use_case::ReconcileUseCase;
use pos_reconciler::infra::csv_loader::CsvTableSource;
use pos_reconciler::infra::issue_report_adapter::{
    CsvIssueOutputAdapter, JsonSummaryOutputAdapter,
};
use pos_reconciler::pipeline::processing::normalize;
use pos_reconciler::{logging, observability, tally, Config, Pipeline, PipelineResult};

#[derive(Parser)]
#[command(name = "pos_reconciler")]
#[command(about = "Cleans and reconciles point-of-sale transaction tables")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML config file (defaults to $POS_RECONCILER_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Field delimiter of the input file
    #[arg(long, global = true, default_value_t = ',')]
    delimiter: char,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full reconciliation pipeline over a CSV file
    Reconcile {
        input: PathBuf,
        /// Write the issue list as CSV (transaction_id,issue)
        #[arg(long)]
        issues_out: Option<PathBuf>,
        /// Write the run summary as JSON
        #[arg(long)]
        summary_out: Option<PathBuf>,
        /// Write Prometheus exposition text of the run's metrics
        #[arg(long)]
        metrics_out: Option<PathBuf>,
        /// Override the configured mismatch tolerance
        #[arg(long)]
        tolerance: Option<f64>,
        /// Number of issues to print
        #[arg(long, default_value_t = 20)]
        show: usize,
    },
    /// Count the distinct values of one column
    Tally {
        input: PathBuf,
        /// Header name as it appears in the input
        #[arg(long)]
        column: String,
        /// Count missing cells as their own value
        #[arg(long)]
        include_missing: bool,
        /// Tally the normalized (typed) column instead of the raw text
        #[arg(long)]
        normalized: bool,
    },
}

fn delimiter_byte(delimiter: char) -> anyhow::Result<u8> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got {:?}", delimiter);
    }
    Ok(delimiter as u8)
}

fn print_summary(result: &PipelineResult) {
    println!("\n📊 Pipeline Results (run {}):", result.run_id);
    println!("   Rows: {}", result.rows);
    if let Some(digest) = &result.input_digest {
        println!("   Input: {}", digest);
    }

    println!("\n🧹 Normalization:");
    println!("   Cells degraded to missing: {}", result.normalization.total_degraded());
    for (column, count) in &result.normalization.degraded {
        println!("   - {}: {}", column, count);
    }

    let identity = &result.identity;
    println!("\n🪪 Identity:");
    println!("   Missing ids: {}", identity.n_id_missing);
    println!(
        "   Duplicated id rows: {} ({} distinct ids)",
        identity.n_id_duplicated_rows, identity.n_id_duplicated_unique
    );
    println!("   Exact duplicate rows: {}", identity.n_exact_duplicated_rows);

    let reconcile = &result.reconcile;
    println!("\n💰 Monetary reconciliation:");
    println!(
        "   Before: {} complete, {} reconstructable, {} unrecoverable",
        reconcile.n_complete_before,
        reconcile.n_reconstructable_before,
        reconcile.n_unrecoverable_before
    );
    println!(
        "   Reconstructed: {} total, {} quantity, {} unit price",
        reconcile.n_reconstructed_total,
        reconcile.n_reconstructed_quantity,
        reconcile.n_reconstructed_price
    );
    println!("   Blocked by zero divisor: {}", reconcile.n_blocked_div0);
    println!(
        "   After: {} complete, {} reconstructable, {} unrecoverable",
        reconcile.n_complete, reconcile.n_reconstructable, reconcile.n_unrecoverable
    );

    let consistency = &result.consistency;
    println!("\n🔍 Consistency (tolerance {}):", consistency.tolerance.value());
    println!("   Checked: {}", consistency.n_checked);
    println!("   Mismatches: {}", consistency.n_mismatch);

    println!("\n⚠️  Issues: {}", result.issues.len());
    for (kind, count) in &result.issue_counts {
        println!("   - {}: {}", kind, count);
    }
}

fn print_issues(result: &PipelineResult, show: usize) {
    if result.issues.is_empty() || show == 0 {
        return;
    }
    println!();
    for issue in result.issues.iter().take(show) {
        println!(
            "   {:<16} {}",
            issue.transaction_id.as_deref().unwrap_or("<missing>"),
            issue.kind
        );
    }
    if result.issues.len() > show {
        println!("   ... {} more", result.issues.len() - show);
    }
}

fn write_metrics(path: &Path) -> anyhow::Result<()> {
    let rendered = observability::render().unwrap_or_default();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, rendered).with_context(|| format!("writing metrics to {}", path.display()))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let _log_guard = logging::init_logging(Path::new(&config.output.log_dir))
        .context("initializing logging")?;
    let delimiter = delimiter_byte(cli.delimiter)?;

    match cli.command {
        Commands::Reconcile {
            input,
            issues_out,
            summary_out,
            metrics_out,
            tolerance,
            show,
        } => {
            if let Some(tolerance) = tolerance {
                config.pipeline.tolerance = tolerance;
            }
            if metrics_out.is_some() {
                observability::init()?;
            }

            // Contract violations surface here, before the input is read
            let pipeline = Pipeline::new(&config).context("invalid pipeline configuration")?;

            println!("🔄 Reconciling {}...", input.display());
            let mut use_case = ReconcileUseCase::new(
                Box::new(CsvTableSource::new(&input).with_delimiter(delimiter)),
                pipeline,
            );
            if let Some(path) = &issues_out {
                use_case = use_case.with_issue_output(Box::new(CsvIssueOutputAdapter::new(path)));
            }
            if let Some(path) = &summary_out {
                use_case =
                    use_case.with_summary_output(Box::new(JsonSummaryOutputAdapter::new(path)));
            }

            let result = match use_case.execute() {
                Ok(result) => result,
                Err(e) => {
                    error!("Reconciliation failed: {}", e);
                    return Err(e).context(format!("reconciling {}", input.display()));
                }
            };

            print_summary(&result);
            print_issues(&result, show);

            if let Some(path) = &issues_out {
                println!("\n📝 Issues written to {}", path.display());
            }
            if let Some(path) = &summary_out {
                println!("📝 Summary written to {}", path.display());
            }
            if let Some(path) = &metrics_out {
                write_metrics(path)?;
                println!("📈 Metrics written to {}", path.display());
            }
            info!(run_id = %result.run_id, "reconcile command finished");
        }
        Commands::Tally {
            input,
            column,
            include_missing,
            normalized,
        } => {
            let loaded = CsvTableSource::new(&input)
                .with_delimiter(delimiter)
                .load()
                .with_context(|| format!("loading {}", input.display()))?;

            let counts = if normalized {
                let Some(canonical) = config.columns.column_for(&column) else {
                    bail!("'{}' is not one of the configured canonical columns", column);
                };
                let (table, _) = normalize::normalize(&loaded.table, &config.columns)?;
                tally::column_value_counts(&table, canonical, include_missing)
            } else {
                tally::raw_value_counts(&loaded.table, &column, include_missing)?
            };

            println!("📊 {} ({} distinct values)", column, counts.len());
            for (value, count) in counts {
                println!("   {:<24} {}", value.as_deref().unwrap_or("<missing>"), count);
            }
        }
    }

    Ok(())
}
