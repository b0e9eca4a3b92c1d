use std::io;
use tokio::runtime::{Builder, Runtime};
use tracing::info;

/// Builds the tokio runtime. Without a thread count everything runs on the
/// calling thread.
pub fn build(threads: Option<usize>) -> io::Result<Runtime> {
    let mut builder = match threads {
        Some(threads) => {
            info!("custom runtime threads: {}", threads);
            let mut builder = Builder::new_multi_thread();
            builder.worker_threads(threads);
            builder
        }
        None => Builder::new_current_thread(),
    };

    builder.enable_all();
    builder.build()
}
