//! Job handler trait and registry.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use queue_core::Job;

/// Result type for job handlers.
pub type HandlerResult = Result<(), String>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Trait for job handlers.
///
/// Implement this trait to define how jobs of a given class are processed.
pub trait JobHandler: Send + Sync + 'static {
    /// The job class this handler processes.
    fn job_class(&self) -> &str;

    /// Process a job.
    fn handle(&self, job: &Job) -> HandlerFuture;
}

/// Registry for job handlers.
///
/// Maps job classes to their handlers for dynamic dispatch.
#[derive(Default)]
pub struct JobHandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobHandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a job class.
    pub fn register<H: JobHandler>(&mut self, handler: H) {
        let class = handler.job_class().to_string();
        self.handlers.insert(class, Arc::new(handler));
    }

    /// Get a handler for a job class.
    pub fn get(&self, class: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(class).cloned()
    }

    pub fn has_handler(&self, class: &str) -> bool {
        self.handlers.contains_key(class)
    }

    /// List all registered job classes.
    pub fn job_classes(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }

    /// Run a job to completion.
    ///
    /// A missing handler and a panicking handler are both reported as errors.
    pub async fn perform(&self, job: &Job) -> HandlerResult {
        let Some(handler) = self.get(job.class()) else {
            return Err(format!("No handler for job class: {}", job.class()));
        };

        match AssertUnwindSafe(handler.handle(job)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(panic_message(panic.as_ref())),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("Job panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("Job panicked: {}", msg)
    } else {
        "Job panicked".to_string()
    }
}

/// A simple function-based job handler.
pub struct FnHandler<F>
where
    F: Fn(&Job) -> HandlerFuture + Send + Sync + 'static,
{
    class: String,
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Job) -> HandlerFuture + Send + Sync + 'static,
{
    /// Create a new function-based handler.
    pub fn new(class: impl Into<String>, handler: F) -> Self {
        Self {
            class: class.into(),
            handler,
        }
    }
}

impl<F> JobHandler for FnHandler<F>
where
    F: Fn(&Job) -> HandlerFuture + Send + Sync + 'static,
{
    fn job_class(&self) -> &str {
        &self.class
    }

    fn handle(&self, job: &Job) -> HandlerFuture {
        (self.handler)(job)
    }
}

/// Helper macro for creating job handlers from async blocks.
#[macro_export]
macro_rules! job_handler {
    ($class:expr, |$job:ident| $body:expr) => {
        $crate::FnHandler::new($class, |$job: &$crate::Job| {
            let $job = $job.clone();
            Box::pin(async move { $body })
        })
    };
}
