//! Non-blocking suspension.
//!
//! Nothing here blocks the thread: a suspended worker is just an actor with
//! an empty mailbox and a timer task that will post to it later.

use std::future::Future;
use std::time::Duration;

use ractor::{ActorRef, Message};
use tokio::task::JoinHandle;

/// Suspend the calling task for `duration`, letting every other task run.
pub async fn suspend(duration: Duration) {
    if duration.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(duration).await;
    }
}

/// Post `message` to `actor` after `duration`, or as soon as `interrupt`
/// resolves, whichever comes first.
///
/// If the actor has stopped by then the message is dropped.
pub fn wake_after<M, F>(
    actor: ActorRef<M>,
    duration: Duration,
    message: M,
    interrupt: F,
) -> JoinHandle<()>
where
    M: Message,
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = suspend(duration) => {}
            _ = interrupt => {}
        }
        let _ = actor.send_message(message);
    })
}
