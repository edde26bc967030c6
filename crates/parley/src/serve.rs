// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve` command implementation.
//!
//! Wires SQLite storage, the chat-completions provider, DuckDuckGo search,
//! and the Telegram channel into the agent loop, then runs until SIGINT or
//! SIGTERM.

use std::sync::Arc;

use parley_agent::shutdown;
use parley_agent::{AgentLoop, TurnPipeline};
use parley_config::ParleyConfig;
use parley_core::{
    ChannelAdapter, ParleyError, PluginAdapter, ProviderAdapter, SearchAdapter, StorageAdapter,
};
use parley_openai::OpenAiProvider;
use parley_search::DuckDuckGoSearch;
use parley_storage::SqliteStorage;
use parley_telegram::TelegramChannel;
use tracing::{error, info, warn};

pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    init_tracing(&config.agent.log_level);

    info!("starting parley serve");

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

    let provider: Arc<dyn ProviderAdapter> = Arc::new(OpenAiProvider::new(&config.llm).map_err(|e| {
        error!(error = %e, "failed to initialize chat-completions provider");
        e
    })?);

    let search: Option<Arc<dyn SearchAdapter>> = if config.search.enabled {
        match DuckDuckGoSearch::new(&config.search) {
            Ok(search) => Some(Arc::new(search)),
            Err(e) => {
                warn!(error = %e, "search initialization failed, continuing without search");
                None
            }
        }
    } else {
        info!("web search disabled by configuration");
        None
    };

    let mut telegram = TelegramChannel::new(config.telegram.clone())?;
    telegram.connect().await?;
    let channel: Arc<dyn ChannelAdapter> = Arc::new(telegram);

    let pipeline = Arc::new(TurnPipeline::new(
        &config,
        provider,
        search,
        Arc::clone(&storage),
        Arc::clone(&channel),
    ));
    let agent_loop = AgentLoop::new(Arc::clone(&channel), storage, pipeline, &config);

    let cancel = shutdown::install_signal_handler();
    agent_loop.run(cancel).await?;

    if let Err(e) = channel.shutdown().await {
        warn!(error = %e, "channel shutdown failed");
    }

    info!("parley serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
