//! `fiber-worker`: runs cooperative Resque workers on one thread.

mod cli;
mod jobs;
mod logging;

use std::process::ExitCode;

use actors::WorkerMachine;
use backend::QueueBackend;
use clap::Parser;
use queue_core::Job;

use cli::{Cli, Command, EnqueueArgs, WorkArgs};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::Enqueue(args)) => {
            logging::init(false, false);
            enqueue(args).await
        }
        None => {
            logging::init(cli.work.is_verbose(), cli.work.vverbose);
            work(cli.work).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn work(args: WorkArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.machine_config()?;
    let mut machine = WorkerMachine::new(config, jobs::registry())?;
    machine.start().await?;
    Ok(())
}

async fn enqueue(args: EnqueueArgs) -> Result<(), Box<dyn std::error::Error>> {
    let backend = args.backend.redis.connect().await?;
    let job = Job::new(args.queue.clone(), args.class.clone(), args.job_args());

    tracing::info!("Enqueuing {}", job);
    backend.enqueue(job).await?;
    Ok(())
}
