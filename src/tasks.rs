//! Detached best-effort work.
//!
//! Side work that must never block or fail the primary write (fan-out
//! bookkeeping, the guest merge after registration) runs through here so
//! every failure lands in one structured log sink instead of ad hoc
//! catch-and-log at call sites.

use std::future::Future;

/// Spawn `fut` detached from the caller. Failures are logged with the given
/// context and swallowed — callers must not depend on completion.
pub fn spawn_logged<F, T, E>(context: &'static str, fut: F)
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            tracing::warn!(task = context, error = %e, "detached task failed");
        }
    });
}
