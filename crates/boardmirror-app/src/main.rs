use anyhow::Result;
use boardmirror_app::config::{parse_batch_limit, AppConfig};
use boardmirror_app::driver::{ReconciliationDriver, RunLimits, RunReport, DEFAULT_FAILURE_LOG_CAP};
use boardmirror_core::{CoreError, SqliteEntityStore};
use integration_trello::{TrelloCardSource, TrelloConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = AppConfig::from_env()?;
    init_logging();
    let cli = parse_cli_flags()?;
    if let Some(batch_limit) = cli.batch_limit {
        config.batch_limit = batch_limit;
    }

    tracing::info!(
        db_path = config.db_path.as_str(),
        batch_limit = config.batch_limit,
        "boardmirror reconciliation starting"
    );

    let store = SqliteEntityStore::open(config.db_path.as_str())?;
    let trello_config = TrelloConfig::from_settings(
        config.trello_api_key.as_str(),
        config.trello_api_token.as_str(),
        config.trello_api_url.as_str(),
    )?;
    let source = TrelloCardSource::new(trello_config)?;

    let mut driver = ReconciliationDriver::new(
        store,
        source,
        RunLimits {
            batch_limit: config.batch_limit,
            failure_log_cap: DEFAULT_FAILURE_LOG_CAP,
        },
    );
    let report = driver.run().await?;

    for line in summary_lines(&report) {
        println!("{line}");
    }

    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn summary_lines(report: &RunReport) -> Vec<String> {
    vec![
        format!(
            "creator repair: {} candidates, {} repaired ({} from movements, {} from creation events), {} failed passes",
            report.creator.candidates,
            report.creator.repaired(),
            report.creator.assigned_from_movements,
            report.creator.assigned_from_events,
            report.creator.failed_passes,
        ),
        format!(
            "list repair: {} candidates, {} repaired, {} skipped (no list upstream), {} failed",
            report.lists.candidates,
            report.lists.repaired,
            report.lists.skipped_no_remote_list,
            report.lists.failed,
        ),
    ]
}

#[derive(Debug, Default)]
struct CliFlags {
    batch_limit: Option<usize>,
}

fn parse_cli_flags() -> Result<CliFlags, CoreError> {
    let mut flags = CliFlags::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--batch-limit" => {
                let value = args.next().ok_or_else(|| {
                    CoreError::Configuration(
                        "Missing value after --batch-limit. Use --batch-limit <n>.".to_owned(),
                    )
                })?;
                flags.batch_limit = Some(parse_batch_limit(Some(value))?);
            }
            "--help" | "-h" => {
                print_cli_help();
                std::process::exit(0);
            }
            value if value.starts_with("--") => {
                return Err(CoreError::Configuration(format!(
                    "Unknown flag '{value}'. Run with --help for valid flags."
                )));
            }
            unknown => {
                return Err(CoreError::Configuration(format!(
                    "Unexpected argument '{unknown}'. Run with --help for valid flags."
                )));
            }
        }
    }

    Ok(flags)
}

fn print_cli_help() {
    println!("Usage: boardmirror-app [--batch-limit <n>]");
    println!();
    println!("  --batch-limit <n>   Cap list-repair candidates for this run (default from BOARDMIRROR_BATCH_LIMIT or 100)");
    println!("  --help              Show this help message");
}
