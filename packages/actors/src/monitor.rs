//! Monitor actor that stops the runtime once every worker has finished.

use std::time::Duration;

use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::messages::MonitorMessage;
use crate::task::Liveness;

/// Default time between liveness checks.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// State for the monitor actor.
pub struct MonitorState {
    /// Liveness flags of every task the machine started.
    pub tasks: Vec<Liveness>,
    /// Ticks handled so far.
    pub ticks: u64,
}

impl MonitorState {
    /// Number of tasks still alive.
    pub fn alive(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_alive()).count()
    }
}

/// Monitor actor arguments.
pub struct MonitorArgs {
    pub tasks: Vec<Liveness>,
    pub tick: Duration,
}

/// Monitor actor. Only ever reads the `alive` flags.
pub struct Monitor;

impl Actor for Monitor {
    type Msg = MonitorMessage;
    type State = MonitorState;
    type Arguments = MonitorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting monitor for {} workers", args.tasks.len());

        // Start periodic tick
        let period = args.tick.max(Duration::from_millis(1));
        let myself_clone = myself.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if myself_clone.send_message(MonitorMessage::Tick).is_err() {
                    break;
                }
            }
        });

        Ok(MonitorState {
            tasks: args.tasks,
            ticks: 0,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            MonitorMessage::Tick => {
                state.ticks += 1;
                let alive = state.alive();

                if alive == 0 {
                    tracing::info!("No workers alive after {} ticks, stopping", state.ticks);
                    myself.stop(Some("all workers stopped".to_string()));
                } else {
                    tracing::trace!("{} of {} workers alive", alive, state.tasks.len());
                }
            }
        }

        Ok(())
    }
}

/// Start a monitor over the given tasks.
pub async fn start_monitor(
    tasks: Vec<Liveness>,
    tick: Duration,
) -> Result<(ActorRef<MonitorMessage>, tokio::task::JoinHandle<()>), ractor::SpawnErr> {
    Actor::spawn(None, Monitor, MonitorArgs { tasks, tick }).await
}
