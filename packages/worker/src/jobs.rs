//! Built-in job classes.

use std::time::Duration;

use actors::{FnHandler, HandlerFuture, Job, JobHandlerRegistry, suspend};

/// Handlers for the bundled job classes:
///
/// - `Echo` logs its arguments
/// - `Sleep` suspends for `args[0]` seconds without blocking other workers
/// - `Fail` always fails, with `args[0]` as the message when given
pub fn registry() -> JobHandlerRegistry {
    let mut handlers = JobHandlerRegistry::new();
    handlers.register(FnHandler::new("Echo", echo));
    handlers.register(FnHandler::new("Sleep", sleep));
    handlers.register(FnHandler::new("Fail", fail));
    handlers
}

fn echo(job: &Job) -> HandlerFuture {
    let job = job.clone();
    Box::pin(async move {
        tracing::info!("Echo from {}: {:?}", job.queue, job.args());
        Ok(())
    })
}

fn sleep(job: &Job) -> HandlerFuture {
    let secs = job.args().first().and_then(|v| v.as_f64()).unwrap_or(1.0);
    Box::pin(async move {
        match Duration::try_from_secs_f64(secs) {
            Ok(duration) => {
                suspend::suspend(duration).await;
                Ok(())
            }
            Err(_) => Err(format!("invalid sleep duration: {}", secs)),
        }
    })
}

fn fail(job: &Job) -> HandlerFuture {
    let message = job
        .args()
        .first()
        .and_then(|v| v.as_str())
        .unwrap_or("job failed")
        .to_string();
    Box::pin(async move { Err(message) })
}
