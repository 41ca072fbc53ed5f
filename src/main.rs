use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing_appender::non_blocking::WorkerGuard;

use work_router::config::{RouterConfig, StoreBackend};
use work_router::llm::create_provider;
use work_router::notify::ActivityNotifier;
use work_router::router::IntentRouter;
use work_router::work::{
    JsonFileRepository, LibSqlRepository, WorkItemRepository, WorkItemStore, WorkOrchestrator,
};
use work_router::workers::WorkerRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    let config = RouterConfig::from_env().context("invalid configuration")?;
    let llm = create_provider(&config.llm);

    eprintln!("🛠  Work Router v{}", env!("CARGO_PKG_VERSION"));
    match &llm {
        Some(provider) => eprintln!("   Classifier: {}", provider.model_name()),
        None => eprintln!("   Classifier: local heuristics (ANTHROPIC_API_KEY not set)"),
    }
    eprintln!("   Store: {} ({:?})", config.store_path.display(), config.store_backend);
    eprintln!("   Type a request and press Enter. /quit to exit.\n");

    // ── Store ────────────────────────────────────────────────────────────
    let repo: Arc<dyn WorkItemRepository> = match config.store_backend {
        StoreBackend::JsonFile => Arc::new(JsonFileRepository::new(&config.store_path)),
        StoreBackend::LibSql => Arc::new(
            LibSqlRepository::new_local(&config.store_path)
                .await
                .with_context(|| {
                    format!("failed to open database at {}", config.store_path.display())
                })?,
        ),
    };
    let store = Arc::new(WorkItemStore::open(repo).await);

    // ── Orchestration ────────────────────────────────────────────────────
    let registry = Arc::new(WorkerRegistry::with_defaults(config.phase_delay));
    let notifier = Arc::new(ActivityNotifier::new());
    let orchestrator = Arc::new(WorkOrchestrator::new(store, registry, notifier));

    let mut activity = BroadcastStream::new(orchestrator.subscribe());
    tokio::spawn(async move {
        while let Some(event) = activity.next().await {
            match event {
                Ok(event) => eprintln!("   · {}", event.summary_line()),
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    tracing::warn!(missed = n, "Activity printer lagged");
                }
            }
        }
    });

    let router = Arc::new(IntentRouter::new(&config, llm, orchestrator));
    let user = std::env::var("USER").unwrap_or_else(|_| "local-user".to_string());

    // ── REPL ─────────────────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = JoinSet::new();
    eprint!("> ");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line.trim().to_string(),
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                };
                if line.is_empty() {
                    eprint!("> ");
                    continue;
                }
                if line == "/quit" {
                    break;
                }

                let router = Arc::clone(&router);
                let user = user.clone();
                in_flight.spawn(async move {
                    let outcome = router.handle(&user, &line).await;
                    println!("\n{}\n", outcome.reply);
                    eprint!("> ");
                });
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!("Request task failed: {}", e);
                }
            }
        }
    }

    // Let running work finish before exit.
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Request task failed: {}", e);
        }
    }
    Ok(())
}

/// Log to stderr, or to a daily rolling file when `WORK_ROUTER_LOG_DIR` is set.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    match std::env::var("WORK_ROUTER_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "work-router.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}
