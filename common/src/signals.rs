use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info};

/// Spawns a task that wakes every waiter on `notifier` once the process
/// receives an interrupt, terminate, quit or hangup signal.
pub fn listen(notifier: Arc<Notify>) {
    tokio::spawn(handle_signals(notifier));
}

async fn handle_signals(notifier: Arc<Notify>) {
    let kinds = [
        SignalKind::interrupt(),
        SignalKind::terminate(),
        SignalKind::quit(),
        SignalKind::hangup(),
    ];

    let mut streams = Vec::with_capacity(kinds.len());
    for kind in kinds {
        match signal(kind) {
            Ok(stream) => streams.push(stream),
            Err(e) => {
                error!("install signal handler: {}", e);
                return;
            }
        }
    }

    let [interrupt, terminate, quit, hup] = &mut streams[..] else {
        return;
    };

    tokio::select! {
        _ = interrupt.recv() => info!("received interrupt signal"),
        _ = hup.recv() => info!("received hup signal"),
        _ = terminate.recv() => info!("received terminate signal"),
        _ = quit.recv() => info!("received quit signal"),
    }

    notifier.notify_waiters();
}
