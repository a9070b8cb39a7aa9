use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::Bot;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use common::actors::ActorType;
use common::logger;
use relay::execution::{DryRunBackend, ExecutionBackend, HttpExecutionBackend};
use relay::{Authenticator, Relay, TradeCopier};
use server::actors::supervisor::Supervisor;
use server::services::signal_notifier::SignalNotifier;
use server::{AppState, ServerConfig, create_app};
use storage::db;
use storage::{NullStore, RecordStore, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::setup_logger();
    dotenv().ok();
    debug!("System starting up...");

    let config = ServerConfig::from_env()?;

    let store: Arc<dyn RecordStore> = match &config.database_path {
        Some(path) => Arc::new(SqliteStore::new(db::open_pool(path).await?)),
        None => {
            warn!("DATABASE_PATH not set: state lives in memory only");
            Arc::new(NullStore)
        }
    };

    let backend: Arc<dyn ExecutionBackend> = match &config.execution {
        Some(exec) => {
            info!("Execution backend at {}", exec.base_url);
            Arc::new(HttpExecutionBackend::new(
                &exec.base_url,
                &exec.api_key,
                &exec.api_secret,
            ))
        }
        None => {
            warn!("No execution backend configured: copying in dry-run mode");
            Arc::new(DryRunBackend)
        }
    };

    let mut auth = Authenticator::new(config.agent_api_key.clone());
    if let Some(token) = &config.mentor_token {
        auth = auth.with_legacy_mentor(token.clone(), config.legacy_mentor_id.clone());
    }

    let relay = Arc::new(Relay::new(store, backend, auth, config.execution_timeout));
    relay.restore().await?;

    let mut supervisor = Supervisor::new();

    let relay_for_copier = relay.clone();
    supervisor.register_actor(
        ActorType::TradeCopier,
        Box::new(move || {
            Box::new(TradeCopier::new(
                relay_for_copier.students.clone(),
                relay_for_copier.copy_feed(),
            ))
        }),
    );

    match &config.telegram {
        Some(telegram) => {
            let bot = Bot::new(telegram.bot_token.clone());
            let chat_id = telegram.chat_id;
            let relay_for_notifier = relay.clone();
            supervisor.register_actor(
                ActorType::SignalNotifier,
                Box::new(move || {
                    Box::new(SignalNotifier::new(
                        bot.clone(),
                        chat_id,
                        relay_for_notifier.clone(),
                    ))
                }),
            );
        }
        None => info!("Telegram not configured: signal notifier disabled"),
    }

    tokio::spawn(async move { supervisor.start().await });

    let app = create_app(AppState::new(relay));
    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!("Relay listening on {}", config.bind_addr());
    axum::serve(listener, app).await?;

    Ok(())
}
