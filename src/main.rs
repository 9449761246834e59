use clap::Parser;
use eyre::{Context, Result};
use log::info;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use buildq::blacklist::RuleSet;
use buildq::config::QueueConfig;
use buildq::history::{Build, InMemoryBuildStore};
use buildq::repograph::{InMemoryRepo, RepoGraph, RepoMap, RepoSnapshot};
use buildq::{BuildQueue, QueueError};

mod cli;

use cli::{Cli, Command};

/// Everything the queue needs to run offline: repo snapshots keyed by repo
/// URL, plus observed builds with their blamelists.
#[derive(Debug, Deserialize)]
struct Fixture {
    repos: BTreeMap<String, RepoSnapshot>,
    #[serde(default)]
    builds: Vec<Build>,
}

async fn build_queue(cli: &Cli) -> Result<BuildQueue> {
    let config = QueueConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let content = std::fs::read_to_string(&cli.snapshot)
        .with_context(|| format!("Failed to read snapshot {}", cli.snapshot.display()))?;
    let fixture: Fixture = serde_json::from_str(&content).context("Failed to parse snapshot")?;

    let mut repos: RepoMap = BTreeMap::new();
    for (url, snapshot) in fixture.repos {
        let repo = InMemoryRepo::new(snapshot).with_context(|| format!("Invalid repo snapshot {url}"))?;
        repos.insert(url, Arc::new(repo) as Arc<dyn RepoGraph>);
    }

    let store = Arc::new(InMemoryBuildStore::new());
    for build in fixture.builds {
        store.insert(build).await;
    }

    let blacklist = match &config.blacklist_file {
        Some(path) => RuleSet::from_file(path).context("Failed to load blacklist rules")?,
        None => RuleSet::empty(),
    };

    let queue =
        BuildQueue::new(config, repos, store, Arc::new(blacklist)).context("Failed to construct the build queue")?;
    queue.update().await.context("Failed to update the build queue")?;
    Ok(queue)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Loading snapshot from {}", cli.snapshot.display());
    let queue = build_queue(&cli).await?;

    match &cli.command {
        Command::Top { n } => {
            for candidate in queue.top_n(*n).await {
                println!("{:<60} {:<40} {}", candidate.builder, candidate.commit.hash, candidate.score);
            }
        }
        Command::Pop { builders } => loop {
            match queue.pop(builders).await {
                Ok(candidate) => {
                    println!("{:<60} {:<40} {}", candidate.builder, candidate.commit.hash, candidate.score)
                }
                Err(QueueError::EmptyQueue) => break,
                Err(e) => return Err(e).context("Pop failed"),
            }
        },
        Command::Recent => {
            for hash in queue.recent_commits().await {
                println!("{hash}");
            }
        }
    }
    Ok(())
}
