//! OS signal listener. Only ever calls `MachineHandle::stop`.

use tokio::task::JoinHandle;

use crate::error::MachineError;
use crate::machine::MachineHandle;

/// Listen for SIGTERM, SIGINT and SIGQUIT until the returned task is aborted.
#[cfg(unix)]
pub(crate) fn listen(handle: MachineHandle) -> Result<JoinHandle<()>, MachineError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate()).map_err(MachineError::Signal)?;
    let mut int = signal(SignalKind::interrupt()).map_err(MachineError::Signal)?;
    let mut quit = signal(SignalKind::quit()).map_err(MachineError::Signal)?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                Some(()) = term.recv() => "SIGTERM",
                Some(()) = int.recv() => "SIGINT",
                Some(()) = quit.recv() => "SIGQUIT",
                else => break,
            };
            tracing::info!("Received {}, stopping workers", name);
            handle.stop();
        }
    }))
}

/// Listen for Ctrl-C until the returned task is aborted.
#[cfg(not(unix))]
pub(crate) fn listen(handle: MachineHandle) -> Result<JoinHandle<()>, MachineError> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, stopping workers");
            handle.stop();
        }
    }))
}
