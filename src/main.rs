use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use aid_normalizer::app::cleanup_use_case::{CleanupOptions, CleanupUseCase};
use aid_normalizer::app::report_use_case::{ReportCache, ReportUseCase};
use aid_normalizer::config::Config;
use aid_normalizer::domain::RawRecord;
use aid_normalizer::infra::in_memory_store::InMemoryRecordStore;
use aid_normalizer::logging;
use aid_normalizer::observability::metrics;
use aid_normalizer::pipeline::processing::aggregate::GroupBy;
use aid_normalizer::pipeline::processing::normalize::{
    AidNormalizer, NormalizationOutcome, Normalizer, Ruleset,
};
use aid_normalizer::pipeline::processing::quality_gate::{DefaultQualityGate, QualityGate};

#[derive(Parser)]
#[command(name = "aid_normalizer")]
#[command(about = "Cleans and summarizes humanitarian-aid distribution records")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (default: $AID_NORMALIZER_CONFIG or config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ruleset TOML to use instead of the embedded one
    #[arg(long, global = true)]
    ruleset: Option<PathBuf>,

    /// Print Prometheus metrics after the command finishes
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize every stored record, write corrections back and delete discarded records
    Clean {
        /// JSON array of records
        #[arg(long)]
        input: PathBuf,
        /// Where to write the cleaned records (default: overwrite input)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Print per-department and per-event counts and every change
        #[arg(long)]
        verbose: bool,
    },
    /// Print the canonical form of each record as JSON; discarded records are omitted
    Normalize {
        #[arg(long)]
        input: PathBuf,
        /// Attach a quality assessment to each record
        #[arg(long)]
        assess: bool,
    },
    /// Summarize the cleaned dataset
    Report {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value = "general")]
        group_by: ReportKind,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        per_page: Option<usize>,
    },
    /// Count records, date range, departments and events
    Check {
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportKind {
    Department,
    District,
    Locality,
    Event,
    DepartmentEvent,
    Year,
    Month,
    Map,
    Table,
    General,
}

impl ReportKind {
    fn group_by(self) -> Option<GroupBy> {
        match self {
            ReportKind::Department => Some(GroupBy::Department),
            ReportKind::District => Some(GroupBy::District),
            ReportKind::Locality => Some(GroupBy::Locality),
            ReportKind::Event => Some(GroupBy::Event),
            ReportKind::DepartmentEvent => Some(GroupBy::DepartmentEvent),
            ReportKind::Year => Some(GroupBy::Year),
            ReportKind::Month => Some(GroupBy::Month),
            ReportKind::Map | ReportKind::Table | ReportKind::General => None,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

fn build_normalizer(cli: &Cli, config: &Config) -> anyhow::Result<Arc<AidNormalizer>> {
    let ruleset = match cli.ruleset.as_ref().or(config.normalizer.ruleset_path.as_ref()) {
        Some(path) => Ruleset::load(path)
            .with_context(|| format!("loading ruleset {}", path.display()))?,
        None => Ruleset::embedded()?,
    };
    info!(version = %ruleset.version, "Ruleset loaded");
    Ok(Arc::new(AidNormalizer::new(Arc::new(ruleset), config.normalizer.policy)))
}

async fn run_clean(
    normalizer: Arc<AidNormalizer>,
    config: &Config,
    input: PathBuf,
    output: Option<PathBuf>,
    dry_run: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    println!("🧹 Cleaning {}", input.display());
    if dry_run {
        println!("⚠️  Dry run: no changes will be saved");
    }

    let store = Arc::new(InMemoryRecordStore::load_json(&input).await?);
    let cleanup = CleanupUseCase::new(store.clone(), normalizer);
    let options = CleanupOptions {
        dry_run,
        verbose,
        progress_every: config.cleanup.progress_every,
    };
    let summary = cleanup.run(options).await?;

    println!("\n📊 Cleanup results (run {}):", summary.run.id);
    println!("   Total records: {}", summary.total_records);
    println!("   Updated: {}", summary.updated);
    println!("   Unchanged: {}", summary.unchanged);
    println!("   Deleted: {}", summary.deleted);
    println!("   Errors: {}", summary.errors);

    if verbose {
        println!("\n   Departments: {}", summary.departments.len());
        println!("   Events: {}", summary.events.len());
        println!("   Records with valid dates: {}", summary.dated_records);
        println!("\n🗺️  Departments:");
        for (department, count) in &summary.departments {
            println!("   • {}: {} records", department, count);
        }
        println!("\n⚡ Events:");
        for (event, count) in &summary.events {
            println!("   • {}: {} records", event, count);
        }
        println!("\n📝 Changes:");
        for change in &summary.changes {
            println!(
                "   {:?} {:?}: {} [{}]",
                change.record_id,
                change.change_type,
                change.change_log,
                change.fields_changed.join(", ")
            );
        }
    }

    if dry_run {
        println!("\n⚠️  Dry run: nothing saved");
    } else {
        let target = output.unwrap_or(input);
        store.save_json(&target).await?;
        println!("\n✅ Saved cleaned records to {}", target.display());
    }
    Ok(())
}

async fn run_normalize(normalizer: Arc<AidNormalizer>, input: PathBuf, assess: bool) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let raws: Vec<RawRecord> = serde_json::from_str(&content)?;

    let gate = DefaultQualityGate::new();
    let mut output = Vec::new();
    let mut discarded = 0;
    for raw in &raws {
        match normalizer.normalize_detailed(raw) {
            NormalizationOutcome::Kept(normalized) if assess => {
                output.push(serde_json::to_value(gate.assess(&normalized))?);
            }
            NormalizationOutcome::Kept(normalized) => output.push(serde_json::to_value(&normalized.record)?),
            NormalizationOutcome::Discarded(_) => discarded += 1,
        }
    }
    info!(records = raws.len(), discarded, "Normalized input");

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_report(
    normalizer: Arc<AidNormalizer>,
    config: &Config,
    input: PathBuf,
    kind: ReportKind,
    page: usize,
    per_page: Option<usize>,
) -> anyhow::Result<()> {
    let store = Arc::new(InMemoryRecordStore::load_json(&input).await?);
    let cache = Arc::new(ReportCache::new(config.report.cache_ttl()));
    let report = ReportUseCase::new(store, normalizer, cache);

    let json = match (kind, kind.group_by()) {
        (_, Some(group_by)) => serde_json::to_string_pretty(&report.summary(group_by).await?)?,
        (ReportKind::Map, None) => serde_json::to_string_pretty(&report.map().await?)?,
        (ReportKind::Table, None) => {
            let per_page = per_page.unwrap_or(config.report.per_page);
            serde_json::to_string_pretty(&report.table(page, per_page).await?)?
        }
        (_, None) => serde_json::to_string_pretty(&report.general().await?)?,
    };
    println!("{}", json);
    Ok(())
}

async fn run_check(normalizer: Arc<AidNormalizer>, input: PathBuf) -> anyhow::Result<()> {
    let store = Arc::new(InMemoryRecordStore::load_json(&input).await?);
    let report = ReportUseCase::new(store, normalizer, Arc::new(ReportCache::default()));
    let check = report.check().await?;

    println!("📊 Stored records: {}", check.stored_records);
    println!("   Kept after cleaning: {}", check.kept_records);
    println!("   Discarded: {}", check.discarded_records);
    match (check.stats.earliest_date, check.stats.latest_date) {
        (Some(first), Some(last)) => println!("📅 Date range: {} to {}", first, last),
        _ => println!("📅 Date range: no dated records"),
    }
    println!("   Undated records: {}", check.stats.undated_records);
    println!("🗺️  Departments ({}): {}", check.stats.total_departments, check.stats.departments.join(", "));
    println!("⚡ Events ({}): {}", check.stats.events.len(), check.stats.events.join(", "));
    println!("📦 Total kits: {}  Total aid: {}", check.stats.total_kits, check.stats.total_aid);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    let _guard = logging::init_logging(&config.logging);

    if cli.metrics {
        metrics::init_metrics()?;
    }

    let normalizer = build_normalizer(&cli, &config)?;

    let result = match cli.command {
        Commands::Clean { input, output, dry_run, verbose } => {
            run_clean(normalizer, &config, input, output, dry_run, verbose).await
        }
        Commands::Normalize { input, assess } => run_normalize(normalizer, input, assess).await,
        Commands::Report { input, group_by, page, per_page } => {
            run_report(normalizer, &config, input, group_by, page, per_page).await
        }
        Commands::Check { input } => run_check(normalizer, input).await,
    };

    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }

    if cli.metrics {
        if let Some(rendered) = metrics::render() {
            println!("{}", rendered);
        }
    }

    result
}
