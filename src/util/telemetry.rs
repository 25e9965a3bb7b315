//! Structured logging setup.

/// Install a default `fmt` subscriber filtered by `RUST_LOG`.
///
/// Does nothing if the host application already installed a subscriber, so
/// the bot's own logging setup always wins. Pool events are emitted at
/// `info` (lifecycle), `warn` (spawn failures, slow shutdown), `error`
/// (unit crashes) and `debug` (per-task dispatch).
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .try_init();
}
