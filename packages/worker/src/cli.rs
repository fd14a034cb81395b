//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use actors::MachineConfig;
use backend::BackendConfig;
use clap::{Args, Parser, Subcommand};
use queue_core::{CoreError, QueueSet};

/// Cooperative Resque-compatible job worker.
#[derive(Parser, Debug)]
#[command(name = "fiber-worker")]
#[command(about = "Run N cooperative workers over Resque queues in one process")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub work: WorkArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Push a job onto a queue and exit.
    Enqueue(EnqueueArgs),
}

/// Backend selection shared by every command.
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Redis server: `redis://host:port[/db]`, `host:port[:db][/namespace]` or `mem://`.
    #[arg(short, long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379", value_parser = BackendConfig::parse)]
    pub redis: BackendConfig,
}

/// Options for running workers (the default command).
#[derive(Args, Debug, Clone)]
pub struct WorkArgs {
    /// Number of concurrent workers.
    #[arg(short = 'c', long, env = "FIBERS", default_value_t = 1)]
    pub fibers: usize,

    /// Seconds an idle worker waits before polling again; 0 exits when idle.
    #[arg(short, long, env = "INTERVAL", default_value = "5", value_parser = parse_interval)]
    pub interval: Duration,

    /// Comma separated queues in priority order, `*` for all (falls back to QUEUE).
    #[arg(short, long, env = "QUEUES")]
    pub queues: Option<String>,

    /// Write the process id to this file.
    #[arg(short, long, env = "PIDFILE")]
    pub pidfile: Option<PathBuf>,

    /// Debug logging (falls back to LOGGING).
    #[arg(short, long, env = "VERBOSE")]
    pub verbose: bool,

    /// Trace logging.
    #[arg(long, env = "VVERBOSE")]
    pub vverbose: bool,

    #[command(flatten)]
    pub backend: BackendArgs,
}

impl WorkArgs {
    pub fn queue_set(&self) -> Result<QueueSet, CoreError> {
        match &self.queues {
            Some(queues) => QueueSet::parse(queues),
            None => match std::env::var("QUEUE") {
                Ok(queues) => QueueSet::parse(&queues),
                Err(_) => Ok(QueueSet::all()),
            },
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose || env_flag("LOGGING")
    }

    pub fn machine_config(&self) -> Result<MachineConfig, CoreError> {
        let mut config = MachineConfig::default()
            .with_fibers(self.fibers)
            .with_interval(self.interval)
            .with_queues(self.queue_set()?)
            .with_backend(self.backend.redis.clone())
            .with_verbose(self.is_verbose())
            .with_very_verbose(self.vverbose);
        if let Some(pidfile) = &self.pidfile {
            config = config.with_pidfile(pidfile);
        }
        Ok(config)
    }
}

/// Arguments for `fiber-worker enqueue`.
#[derive(Args, Debug, Clone)]
pub struct EnqueueArgs {
    /// Queue to push onto.
    pub queue: String,

    /// Job class.
    pub class: String,

    /// Job arguments; each is parsed as JSON, falling back to a string.
    pub args: Vec<String>,

    #[command(flatten)]
    pub backend: BackendArgs,
}

impl EnqueueArgs {
    pub fn job_args(&self) -> Vec<serde_json::Value> {
        self.args
            .iter()
            .map(|arg| {
                serde_json::from_str(arg).unwrap_or_else(|_| serde_json::Value::String(arg.clone()))
            })
            .collect()
    }
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid interval: {}", s))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| format!("interval must be a non-negative number of seconds: {}", s))
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| !matches!(v.trim(), "" | "0" | "false" | "no" | "off"))
        .unwrap_or(false)
}
