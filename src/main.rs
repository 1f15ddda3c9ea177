use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use battle_jobs::audio::MurekaClient;
use battle_jobs::battle::NewBattle;
use battle_jobs::config::WorkerConfig;
use battle_jobs::jobs::{BattleWorker, JobKind, JobQueue};
use battle_jobs::lyrics::RigLyricsGenerator;
use battle_jobs::store::{BattleStore, LibSqlBackend};

const USAGE: &str = "usage: battle-jobs [<ai_one> <ai_two> [rounds]]";
const DEFAULT_ROUNDS: u32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env().context("Failed to load configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let request = match args.as_slice() {
        [] => None,
        [ai_one, ai_two] => Some(NewBattle::new(
            ai_one.as_str(),
            ai_two.as_str(),
            DEFAULT_ROUNDS.min(config.pipeline.max_rounds),
        )),
        [ai_one, ai_two, rounds] => {
            let rounds: u32 = rounds
                .parse()
                .with_context(|| format!("Invalid round count '{rounds}'\n{USAGE}"))?;
            Some(NewBattle::new(ai_one.as_str(), ai_two.as_str(), rounds))
        }
        _ => bail!(USAGE),
    };
    if let Some(request) = &request {
        if let Err(reason) = request.validate(config.pipeline.max_rounds) {
            bail!("Invalid battle: {reason}\n{USAGE}");
        }
    }

    eprintln!("🎤 Battle Jobs v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Genre: {}", config.pipeline.genre.as_str());
    eprintln!("   Lyrics model: {}", config.lyrics.model);

    // ── Database ─────────────────────────────────────────────────────────
    let store = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );

    // ── Providers ────────────────────────────────────────────────────────
    let lyrics = Arc::new(
        RigLyricsGenerator::new(config.lyrics.clone())
            .context("Failed to create lyrics generator")?,
    );
    let audio = Arc::new(MurekaClient::new(config.mureka.clone()));

    // ── Queue ────────────────────────────────────────────────────────────
    let worker = Arc::new(BattleWorker::new(
        store.clone(),
        lyrics,
        audio,
        config.pipeline.clone(),
    ));
    let queue = JobQueue::new(worker.clone());

    let recovered = worker
        .orchestrator()
        .recover_interrupted(&queue)
        .await
        .context("Failed to recover interrupted battles")?;
    if !recovered.is_empty() {
        tracing::info!(count = recovered.len(), "Resuming interrupted battles");
    }

    let mut watched = recovered;
    if let Some(request) = request {
        let battle = store
            .create_battle(&request)
            .await
            .context("Failed to create battle")?;
        eprintln!(
            "   Battle {}: {} vs {} ({} rounds)",
            battle.id, battle.ai_one, battle.ai_two, battle.total_rounds
        );
        queue
            .enqueue(JobKind::OrchestrateBattle {
                battle_id: battle.id,
            })
            .await;
        watched.push(battle.id);
    }

    queue.wait_idle().await;

    let stats = queue.stats().await;
    tracing::info!(
        completed = stats.completed,
        failed = stats.failed,
        "Queue drained"
    );

    for id in watched {
        let Some(battle) = store.get_battle_with_verses(id).await? else {
            continue;
        };
        println!(
            "{}  {:<10}  {} vs {}",
            battle.battle.id,
            battle.battle.status.as_str(),
            battle.battle.ai_one,
            battle.battle.ai_two
        );
        for verse in &battle.verses {
            println!(
                "  #{} {:<12} {:<10} {}",
                verse.position,
                verse.author,
                verse.remote_status.as_deref().unwrap_or("-"),
                verse.audio_url.as_deref().unwrap_or("-"),
            );
        }
    }

    Ok(())
}

/// Console logging, plus a daily-rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "battle-jobs.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    guard
}
