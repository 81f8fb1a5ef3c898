//! Process-wide shutdown state.
//!
//! - `SHUTDOWN`: Has shutdown been requested? (Ctrl+C received)
//!
//! The flag is shared as an `Arc` so the worker pool can hand it to every
//! compiler invocation as its cancel flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use tokio::sync::Notify;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: LazyLock<Arc<AtomicBool>> = LazyLock::new(|| Arc::new(AtomicBool::new(false)));

/// Wakes the dev-mode event loop on shutdown
static SHUTDOWN_NOTIFY: LazyLock<Notify> = LazyLock::new(Notify::new);

/// Setup the global Ctrl+C handler. Call once at program start
///
/// - First Ctrl+C: set the flag (running compilers are killed), wake the
///   watch loop
/// - Second Ctrl+C: exit immediately
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        crate::log!("dev"; "shutting down...");
        SHUTDOWN_NOTIFY.notify_one();
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Shared shutdown flag, used as the cancel flag of full builds.
pub fn shutdown_flag() -> Arc<AtomicBool> {
    Arc::clone(&SHUTDOWN)
}

/// Resolve once shutdown has been requested.
pub async fn wait_for_shutdown() {
    if is_shutdown() {
        return;
    }
    SHUTDOWN_NOTIFY.notified().await;
}

// =============================================================================
// Tests
// =============================================================================
