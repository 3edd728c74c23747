#[tokio::main]
async fn main() {
    clipboard_history_lib::init_logging();

    if let Err(e) = clipboard_history_lib::run().await {
        tracing::error!(error = %e, "clipboard-history exited with an error");
        std::process::exit(1);
    }
}
