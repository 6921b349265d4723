use attendance_buddy::{
    config::{self, AppConfig, DEFAULT_CONFIG_PATH, SyncConfig, database},
    core::{
        attendance::SessionSubmission,
        class::{get_class_by_code, seed_classes},
        report::{format_daily_report, format_summary, generate_summary_report},
        state::TrackerState,
        summary::RecordFilter,
        sync::DirectoryRemote,
        term::seed_terms,
        transfer::{ImportMode, export_all, parse_bundle, to_json},
    },
    entities::Session,
    errors::{Error, Result},
};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "attendance-buddy")]
#[command(about = "Per-session class attendance tracker", long_about = None)]
struct Cli {
    /// School configuration file [default: config.toml]
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create tables and seed classes and terms from the configuration
    Init,
    /// Save one session's counts for a class
    Record {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        session: Session,
        #[arg(long)]
        class: String,
        #[arg(long)]
        year_group: String,
        #[arg(long)]
        males: u32,
        #[arg(long)]
        females: u32,
    },
    /// Print the per-class report for one day
    Report {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print aggregate figures for a filtered set of entries
    Summary {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Class code; needs --year-group to pick the class
        #[arg(long, requires = "year_group")]
        class: Option<String>,
        #[arg(long)]
        year_group: Option<String>,
        #[arg(long)]
        session: Option<Session>,
        #[arg(long)]
        term: Option<i64>,
        #[arg(long)]
        week: Option<u32>,
    },
    /// Write every class, term and entry to a JSON file
    Export {
        #[arg(long, default_value = "attendance-export.json")]
        out: PathBuf,
    },
    /// Read an exported JSON file into the database
    Import {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = ImportMode::Merge)]
        mode: ImportMode,
    },
    /// Push queued documents to the remote store
    Sync,
}

/// An explicit `--config` must exist. Without one, the default file is used
/// when present.
fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        return config::load_config(path);
    }
    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        return config::load_default_config();
    }
    warn!(
        "Configuration file {DEFAULT_CONFIG_PATH} not found, continuing without classes or terms"
    );
    Ok(AppConfig::default())
}

async fn flush_if_enabled(state: &TrackerState, sync: &SyncConfig) -> Result<()> {
    if !sync.is_enabled() {
        return Ok(());
    }
    let (Some(installation_id), Some(directory)) = (&sync.installation_id, &sync.directory) else {
        return Ok(());
    };
    let remote = DirectoryRemote::new(directory);
    let report = state.sync(&remote, installation_id).await?;
    if let Some(message) = &report.last_error {
        warn!("Last remote sync error: {message}");
    }
    println!("{}", report.notice());
    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenv().ok();
    let cli = Cli::parse();

    let app_config = load_app_config(cli.config.as_deref())?;
    let sync_config = app_config.sync.clone().with_env_overrides();

    if std::env::var("DATABASE_URL").is_err() {
        tokio::fs::create_dir_all("data").await?;
    }
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db).await?;

    let mut state = TrackerState::load(db).await?;

    match cli.command {
        Commands::Init => {
            let classes = seed_classes(state.db(), &app_config.classes).await?;
            let terms = seed_terms(state.db(), &app_config.terms).await?;
            state.rebuild().await?;
            info!("Seeded {classes} classes and {terms} terms");
            println!("Database ready: {classes} class(es) and {terms} term(s) added.");
        }
        Commands::Record {
            date,
            session,
            class,
            year_group,
            males,
            females,
        } => {
            let class = get_class_by_code(state.db(), &class, &year_group)
                .await?
                .ok_or_else(|| Error::ClassNotFound {
                    id: format!("{class} ({year_group})"),
                })?;
            let saved = state
                .record_session(&SessionSubmission {
                    date: date.unwrap_or_else(today),
                    session,
                    class_id: class.id,
                    males_present: males,
                    females_present: females,
                })
                .await?;
            if saved.clamped {
                println!(
                    "Counts lowered to the roster: {} male, {} female.",
                    saved.entry.males_present, saved.entry.females_present
                );
            }
            println!(
                "Saved {} {} for {}: {} of {} present.",
                saved.entry.date,
                saved.entry.session,
                class.code,
                saved.entry.males_present + saved.entry.females_present,
                saved.entry.total_males + saved.entry.total_females
            );
            flush_if_enabled(&state, &sync_config).await?;
        }
        Commands::Report { date } => {
            let report = state.daily_report(date.unwrap_or_else(today)).await?;
            print!("{}", format_daily_report(&report));
        }
        Commands::Summary {
            from,
            to,
            class,
            year_group,
            session,
            term,
            week,
        } => {
            let class_id = match &class {
                Some(code) => {
                    let group = year_group
                        .as_deref()
                        .ok_or_else(|| Error::validation("--class needs --year-group"))?;
                    let found = get_class_by_code(state.db(), code, group)
                        .await?
                        .ok_or_else(|| Error::ClassNotFound {
                            id: format!("{code} ({group})"),
                        })?;
                    Some(found.id)
                }
                None => None,
            };
            let filter = RecordFilter {
                term_id: term,
                week,
                from,
                to,
                class_id,
                year_group,
                session,
            };
            let report = generate_summary_report(state.db(), filter).await?;
            print!("{}", format_summary(&report.overall));
            for (class, summary) in &report.per_class {
                println!(
                    "{} ({}): {}% over {} record(s)",
                    class.code, class.year_group, summary.average_attendance, summary.total_records
                );
            }
        }
        Commands::Export { out } => {
            let bundle = export_all(state.db()).await?;
            tokio::fs::write(&out, to_json(&bundle)?).await?;
            println!(
                "Exported {} class(es), {} term(s) and {} entr(ies) to {}.",
                bundle.data.classes.len(),
                bundle.data.terms.len(),
                bundle.data.attendance.len(),
                out.display()
            );
        }
        Commands::Import { file, mode } => {
            let contents = tokio::fs::read_to_string(&file).await?;
            let bundle = parse_bundle(&contents)?;
            let report = state.import(&bundle, mode).await?;
            println!(
                "Imported ({mode}): classes +{} ~{}, terms +{} ~{}, entries +{} ~{} skipped {}.",
                report.classes_added,
                report.classes_updated,
                report.terms_added,
                report.terms_updated,
                report.entries_added,
                report.entries_updated,
                report.entries_skipped
            );
        }
        Commands::Sync => {
            if !sync_config.is_enabled() {
                return Err(Error::Config {
                    message: "Set sync.installation_id and sync.directory to enable remote sync"
                        .to_string(),
                });
            }
            flush_if_enabled(&state, &sync_config).await?;
        }
    }

    Ok(())
}
