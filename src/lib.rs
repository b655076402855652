pub mod analyze;
pub mod config;
pub mod error;
pub mod logger;
pub mod server;

/// Load settings, start logging and serve until the listener fails.
pub async fn run() -> error::AppResult<()> {
    // Set up panic hook to log panics before they crash the worker
    std::panic::set_hook(Box::new(|panic_info| {
        let message = error::panic_message(panic_info.payload());
        let location = if let Some(location) = panic_info.location() {
            format!("{}:{}:{}", location.file(), location.line(), location.column())
        } else {
            "Unknown location".to_string()
        };

        // Direct write: the batching logger may not flush before the process exits.
        eprintln!("FATAL PANIC: {} at {}", message, location);

        crate::logger::error(
            "panic",
            &format!(
                "PANIC occurred: message='{}', location='{}', backtrace available via RUST_BACKTRACE=1",
                message, location
            ),
        );
    }));

    let dotenv = config::load_dotenv();
    let settings = config::load()?;
    logger::init(&settings.log_level);
    if let Some(path) = dotenv {
        logger::info("config", &format!("Loaded environment from {}", path.display()));
    }
    logger::info(
        "app",
        &format!("VeriSight relay {} starting", env!("CARGO_PKG_VERSION")),
    );
    server::serve(settings).await
}
