use std::future::Future;

use tokio::task::JoinHandle;
use tracing::Instrument;

/// Spawns a tokio task that is tracked by the task count gauge, labelled with the spawn site.
pub fn spawn<F>(file: &str, line: u32, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let label = format!("{file}:{line}");

    tokio::spawn(
        async move {
            let metric = crate::metrics::TASK_COUNT.with_label_values(&[label.as_str()]);
            metric.inc();
            let result = future.await;
            metric.dec();
            result
        }
        .in_current_span(),
    )
}
