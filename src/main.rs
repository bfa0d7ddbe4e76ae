use anyhow::Result;
use clap::Parser;
use dealfinder::config::Config;
use dealfinder::logging;
use dealfinder::models::RunOutcome;
use dealfinder::notifier::{DiscordWebhook, Notifier, SocialPoster};
use dealfinder::runner::{run_once, RunOptions};
use dealfinder::scraper::{build_client, HttpImageFetcher, PhotonicSource};
use dealfinder::store::DealStore;
use dealfinder::twitter::TwitterPoster;
use tracing::{error, info, warn};

/// Checks the deals page once and announces anything new. Meant to be run
/// from a scheduler; all settings come from the environment or `.env`.
#[derive(Parser, Debug)]
#[command(author, version, about = "Dealfinder - announces new dispensary deals")]
struct Args {}

fn main() -> Result<()> {
    let _args = Args::parse();

    let config = Config::from_env()?;
    logging::init_logging(&config.log_level, config.log_file.as_deref());

    if let Err(e) = run(&config) {
        error!("Run failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

fn run(config: &Config) -> Result<()> {
    let client = build_client(config.request_timeout)?;

    let source = PhotonicSource::new(client.clone(), &config.landing_url, &config.ajax_url);
    let fetcher = HttpImageFetcher::new(client.clone());
    let store = DealStore::new(&config.state_file);
    let webhook = DiscordWebhook::new(
        client.clone(),
        &config.webhook_url,
        &config.bot_name,
        &config.avatar_url,
    );
    let twitter = config
        .twitter
        .clone()
        .map(|credentials| TwitterPoster::new(client.clone(), credentials));
    let social = twitter.as_ref().map(|poster| poster as &dyn SocialPoster);

    let notifier = Notifier::new(&webhook, &fetcher, social, &config.messages);
    let options = RunOptions {
        identity_policy: config.identity_policy,
        change_semantics: config.change_semantics,
    };

    info!(
        "Checking deals (identity: {}, social posting: {})",
        config.identity_policy,
        if social.is_some() { "on" } else { "off" }
    );

    match run_once(&source, &fetcher, &store, &notifier, &options)? {
        RunOutcome::NoChanges => info!("Nothing to do"),
        RunOutcome::Persisted => info!("Deal history updated"),
        RunOutcome::Announced { new_deals, failures } => {
            if failures.is_empty() {
                info!("Announced {} new deals", new_deals);
            } else {
                warn!(
                    "Announced {} new deals, {} announcements failed",
                    new_deals,
                    failures.len()
                );
            }
        }
    }

    Ok(())
}
