pub mod console;
pub mod core;
pub mod shared;

use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::console::Console;
use crate::core::clipboard::{ClipboardHistory, ClipboardMonitor, ClipboardSource, HistoryFile, SystemClipboard};
use crate::core::features::ClipboardFeature;
use crate::shared::error::AppResult;
use crate::shared::settings::AppSettings;

/// Install the `tracing` subscriber. Honors `RUST_LOG`, defaulting to `info`.
///
/// Logs go to stderr so they stay out of the console's output.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run() -> AppResult<()> {
    // Load settings
    let settings = AppSettings::load().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load settings, using defaults");
        AppSettings::default()
    });

    serve(
        &settings,
        Arc::new(SystemClipboard),
        BufReader::new(std::io::stdin()),
        std::io::stdout(),
    )
    .await
}

/// Load the history, run the monitor alongside a console on `input`/`output`,
/// and write the final history once the console exits.
pub async fn serve<R, W>(
    settings: &AppSettings,
    source: Arc<dyn ClipboardSource>,
    input: R,
    output: W,
) -> AppResult<()>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    // Load persisted history; a broken file never blocks startup
    let file = Arc::new(HistoryFile::new(settings.history_path()?));
    let items = {
        let file = Arc::clone(&file);
        tokio::task::spawn_blocking(move || file.load_or_default()).await?
    };
    let history = ClipboardHistory::from_items(items, settings.max_history_size);

    // Initialize clipboard monitor
    let monitor = ClipboardMonitor::new(
        source,
        history,
        Arc::clone(&file),
        settings.poll_interval(),
    );
    monitor.start();

    let feature = ClipboardFeature::new(monitor.clone(), Arc::clone(&file));
    let console_result = tokio::task::spawn_blocking(move || {
        let console = Console::new(input, output);
        console.run(&feature)
    })
    .await?;

    // Final flush once the poller can no longer mutate the history
    monitor.shutdown().await;
    monitor.persist().await;

    console_result
}
