//! Startup helpers for the sidebar assistant.
//!
//! `run` starts the terminal front end; `run_background` starts the
//! background message service.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::Level;

use crate::chat::{OfferSearchDetector, SessionController, SqliteChatStore};
use crate::config::SidebarConfig;
use crate::llm::{CompletionBackend, OpenRouterClient};
use crate::page::{FixedPage, PageContextProvider, ScrapedPage};
use crate::server::{self, AppState, BackgroundClient};
use crate::speech::{AudioPlayer, GeminiTts, WavFileOutput};
use crate::terminal::{Repl, StdinConfirmer, TerminalView};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing(level: Level) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Option<SidebarConfig> {
    let config = SidebarConfig::from_env();
    if let Err(e) = config.validate() {
        tracing::error!("{e}");
        return None;
    }
    Some(config)
}

/// Run the terminal front end (used by the `sidebar_chat` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` when input ends, `1` on startup failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing(Level::WARN);

    let Some(config) = load_config() else {
        return ExitCode::from(1);
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    rt.block_on(async {
        let mut repl = match build_repl(&config) {
            Ok(repl) => repl,
            Err(e) => {
                tracing::error!("Failed to start: {e}");
                return ExitCode::from(1);
            }
        };
        repl.run().await;
        ExitCode::SUCCESS
    })
}

/// Wire the controller, speech and front end from configuration.
///
/// # Errors
/// Returns an error if storage or a client cannot be created.
pub fn build_repl(config: &SidebarConfig) -> Result<Repl, BoxError> {
    std::fs::create_dir_all(&config.storage.data_dir)?;
    let store = SqliteChatStore::open(config.storage.database_path())?;

    let backend: Arc<dyn CompletionBackend> = match &config.server.background_url {
        Some(url) => {
            tracing::info!("Using background service at {url}");
            Arc::new(BackgroundClient::new(url, config.completion.api_key.clone())?)
        }
        None => Arc::new(OpenRouterClient::new(config.completion.clone())?),
    };

    let page: Arc<dyn PageContextProvider> = match &config.page_url {
        Some(url) => Arc::new(ScrapedPage::new(reqwest::Client::new(), url.clone())),
        None => Arc::new(FixedPage::default()),
    };

    let mut controller = SessionController::new(
        Box::new(store),
        backend,
        page,
        Box::new(OfferSearchDetector::new()?),
    )
    .with_confirmer(Box::new(StdinConfirmer))
    .with_history_window(config.completion.history_window);
    controller.subscribe(Box::new(TerminalView));
    controller.init();

    let tts = Arc::new(GeminiTts::new(config.speech.clone())?);
    let player = AudioPlayer::new(Arc::new(WavFileOutput::new(config.storage.speech_path())));

    Ok(Repl::new(controller, tts, player))
}

/// Run the background service (used by the `sidebar-background` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run_background() -> ExitCode {
    init_tracing(Level::INFO);

    tracing::info!("Starting sidebar background service v{}", env!("CARGO_PKG_VERSION"));

    let Some(config) = load_config() else {
        return ExitCode::from(1);
    };
    if config.completion.api_key.is_none() {
        tracing::warn!("OPENROUTER_API_KEY is not set; messages must carry their own key");
    }

    let state = match AppState::new(config.completion.clone()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to create state: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down");
    };

    if let Err(e) = rt.block_on(run_server_with_shutdown(state, config.server.port, shutdown)) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Run the background service with graceful shutdown.
///
/// # Errors
/// Returns an error if the server fails.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> Result<(), BoxError>
where
    F: Future<Output = ()> + Send + 'static,
{
    server::run_server_with_shutdown(state, port, shutdown_signal).await
}
