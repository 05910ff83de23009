//! Gatehouse bot: Telegram front end for driver check-in.

mod config;
mod dispatch;
mod error;
mod telegram;

use crate::config::BotConfig;
use crate::dispatch::Dispatcher;
use crate::error::BotError;
use crate::telegram::{TelegramClient, Update};
use gatehouse_conversation::{ConversationEngine, InMemorySessionStore};
use gatehouse_notify::SmtpArrivalNotifier;
use gatehouse_registry::SqliteDriverRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pause before polling again after a failed poll.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> gatehouse_core::Result<(), BotError> {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::from_env().map_err(|e| BotError::Config {
        details: e.to_string(),
    })?;
    info!(store = %config.store.path.display(), "loaded configuration");

    let registry = SqliteDriverRegistry::new(&config.store);
    match registry.ensure_available().await {
        Ok(()) => match registry.migrate().await {
            Ok(()) => info!("driver store ready"),
            Err(e) => warn!(error = %e, "failed to prepare driver store"),
        },
        Err(e) => warn!(
            store = %registry.path().display(),
            error = %e,
            "driver store missing, check-ins will fail until it is created"
        ),
    }

    let notifier = SmtpArrivalNotifier::new(&config.smtp).map_err(|e| BotError::Notifier {
        details: e.to_string(),
    })?;
    let telegram = TelegramClient::new(&config.telegram).map_err(|e| BotError::Transport {
        details: e.to_string(),
    })?;

    let engine = Arc::new(ConversationEngine::new(
        registry,
        notifier,
        InMemorySessionStore::new(),
    ));
    let mut dispatcher = Dispatcher::new(
        Arc::clone(&engine),
        Arc::new(telegram.clone()),
        Duration::from_secs(config.turn_timeout_seconds),
    );

    info!("polling for messages");
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut offset = None;

    loop {
        let polled = tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            polled = telegram.get_updates(offset) => polled,
        };

        let updates = match polled {
            Ok(updates) => updates,
            Err(e) => {
                error!(error = %e, "polling failed");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            offset = Some(last + 1);
        }

        let batch = updates
            .into_iter()
            .filter_map(Update::into_incoming)
            .collect();
        dispatcher.dispatch(batch);
    }

    info!(users = dispatcher.in_flight(), "waiting for running turns");
    dispatcher.drain().await;
    engine.registry().close().await;
    info!("gatehouse bot stopped");
    Ok(())
}
