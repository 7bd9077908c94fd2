use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use class_action_finder::config::{Config, SourcesFile, DEFAULT_TIMEOUT_SECS};
use class_action_finder::eligibility::{Lexicon, ProofClassifier};
use class_action_finder::finder::Finder;
use class_action_finder::notify::{LogNotifier, NotificationPayload, Notifier, WebhookNotifier};
use class_action_finder::scrapers::{build_adapters, build_client};

#[derive(Parser, Debug)]
#[command(name = "class_action_finder", about = "Report new no-proof class action settlements")]
struct Cli {
    /// Directory holding `tracking/`
    #[arg(long, env = "ROOT", default_value = ".")]
    root: PathBuf,

    /// Dedup store path, relative to the root unless absolute
    #[arg(long)]
    store: Option<PathBuf>,

    /// Per-request timeout for listing pages
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Run everything but leave the store untouched and send nothing
    #[arg(long)]
    dry_run: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("class_action_finder=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = Config::new(&cli.root)
        .with_timeout(Duration::from_secs(cli.timeout_secs))
        .with_dry_run(cli.dry_run);
    if let Some(store) = &cli.store {
        config = config.with_store_path(store);
    }

    let sources = SourcesFile::load(&config.root)?;
    let lexicon = Lexicon::load(&config.root)?;
    let classifier = ProofClassifier::new(&lexicon)?;
    let client = build_client(config.timeout)?;
    let adapters = build_adapters(&sources)?;

    info!(
        root = %config.root.display(),
        store = %config.store_path.display(),
        sources = adapters.len(),
        dry_run = config.dry_run,
        "class action finder starting"
    );

    let finder = Finder::new(adapters, classifier, client.clone(), &config);
    let outcome = match finder.run().await {
        Ok(outcome) => outcome,
        Err(e) if e.is_fatal() => {
            error!(error = %e, "run aborted");
            return Err(e).context("run aborted; dedup store left unchanged");
        }
        Err(e) => {
            warn!(error = %e, "run ended early; nothing to report");
            return Ok(());
        }
    };

    print!("{}", outcome.stats);

    if outcome.new_records.is_empty() {
        info!("no new settlements");
        return Ok(());
    }

    let payload = NotificationPayload::new(
        outcome.new_records,
        outcome.stats,
        chrono::Local::now().date_naive(),
    );

    if config.dry_run {
        info!(count = payload.settlements.len(), "dry run; digest not sent");
        println!("{}", payload.render_text());
        return Ok(());
    }

    let notifier: Box<dyn Notifier> = match WebhookNotifier::from_env(client) {
        Some(webhooks) => Box::new(webhooks),
        None => Box::new(LogNotifier),
    };

    // The store already records these settlements; a failed send is not retried
    if let Err(e) = notifier.send(&payload).await {
        warn!(error = %e, count = payload.settlements.len(), "digest not delivered");
    }

    Ok(())
}
