//! Cooperative job workers on a single-threaded runtime.
//!
//! This crate provides the Ractor-based scheduling core: workers that poll
//! queues, the tasks that track their liveness, and the machine and monitor
//! that start and stop them.
//!
//! # Architecture
//!
//! - `WorkerMachine` - Builds `fibers` workers from a `MachineConfig` and runs them
//! - `WorkerActor` - One reserve/execute/suspend loop over a queue set
//! - `WorkerTask` - Wraps a worker and exposes its `alive` flag
//! - `Monitor` - Stops the machine once no task is alive
//!
//! Every actor runs on the same tokio runtime; run it with the
//! `current_thread` flavor to get strictly cooperative scheduling.
//!
//! # Usage
//!
//! ```ignore
//! use actors::{JobHandlerRegistry, MachineConfig, WorkerMachine, job_handler};
//!
//! let mut handlers = JobHandlerRegistry::new();
//! handlers.register(job_handler!("Echo", |job| {
//!     tracing::info!("{:?}", job.args());
//!     Ok(())
//! }));
//!
//! let mut machine = WorkerMachine::new(MachineConfig::default(), handlers)?;
//! machine.start().await?;
//! ```

mod control;
mod error;
mod handler;
mod machine;
mod messages;
mod monitor;
mod pidfile;
mod signals;
pub mod suspend;
mod task;
mod worker_actor;

pub use control::WorkerControl;
pub use error::MachineError;
pub use handler::{FnHandler, HandlerFuture, HandlerResult, JobHandler, JobHandlerRegistry};
pub use machine::{MachineConfig, MachineHandle, WorkerMachine};
pub use messages::{MonitorMessage, WorkerMessage};
pub use monitor::{DEFAULT_TICK, Monitor, MonitorArgs, MonitorState, start_monitor};
pub use pidfile::Pidfile;
pub use task::{AliveGuard, Liveness, Worker, WorkerState, WorkerTask};
pub use worker_actor::{WorkerActor, WorkerActorState, WorkerArgs};

pub use queue_core::{Job, WorkerEvent};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, concurrency};
