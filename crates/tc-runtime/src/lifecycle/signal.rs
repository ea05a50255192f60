use std::io;

use crate::capture::StopHandle;

/// Forward every SIGINT or SIGTERM to `stop` until the task is aborted.
///
/// A signal that arrives before a source is attached stops nothing, so the
/// watcher keeps listening for the next one.
pub async fn wait_for_signal(stop: StopHandle) {
    if let Err(e) = listen(&stop).await {
        tc_warn!(sys, error = %e, "cannot listen for shutdown signals");
    }
}

#[cfg(unix)]
async fn listen(stop: &StopHandle) -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    loop {
        let name = tokio::select! {
            Some(()) = interrupt.recv() => "SIGINT",
            Some(()) = terminate.recv() => "SIGTERM",
            else => return Ok(()),
        };
        forward(stop, name);
    }
}

#[cfg(not(unix))]
async fn listen(stop: &StopHandle) -> io::Result<()> {
    loop {
        tokio::signal::ctrl_c().await?;
        forward(stop, "Ctrl-C");
    }
}

fn forward(stop: &StopHandle, name: &'static str) {
    tc_info!(sys, signal = name, "received signal, stopping capture");
    stop.stop();
}
