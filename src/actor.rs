//! Actor runtime
//!
//! A minimal single-consumer execution primitive: every actor owns its state
//! and a bounded mailbox, and one task drains the mailbox strictly in arrival
//! order. Other components only ever talk to an actor through its
//! [`ActorHandle`], so no lock is needed around the state.
//!
//! - `submit` is fire-and-forget but waits for mailbox space when full
//! - `call` adds call/return semantics with a one-shot reply slot
//! - `stop` is idempotent and lets the loop finish only the item in progress

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ActorError;

/// Default mailbox capacity for every actor in the chat core
pub const MAILBOX_CAPACITY: usize = 16;

/// One-time stop flag shared between an actor loop and its handles
///
/// Cloning shares the same flag. Only the first [`StopSignal::trigger`]
/// call has an effect.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    fired: Arc<AtomicBool>,
    token: CancellationToken,
}

impl StopSignal {
    /// Create an untriggered signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal
    ///
    /// Returns true only for the call that actually fired it.
    pub fn trigger(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    /// Check whether the signal has fired
    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Wait until the signal fires
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }
}

/// State plus behaviour driven by a single mailbox loop
pub trait Actor: Send + 'static {
    /// Work item accepted by this actor's mailbox
    type Message: Send + 'static;

    /// Name used in log lines
    fn name(&self) -> String;

    /// Process one work item to completion
    fn handle(
        &mut self,
        msg: Self::Message,
        ctx: &Context<Self::Message>,
    ) -> impl Future<Output = ()> + Send;

    /// Runs once after the loop has exited
    fn stopped(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Per-actor context handed to every `handle` call
pub struct Context<M> {
    myself: mpsc::WeakSender<M>,
    stop: StopSignal,
    name: Arc<str>,
}

impl<M> Context<M> {
    /// A strong handle to the running actor, if anyone can still reach it
    pub fn myself(&self) -> Option<ActorHandle<M>> {
        self.myself.upgrade().map(|tx| ActorHandle {
            tx,
            stop: self.stop.clone(),
            name: self.name.clone(),
        })
    }

    /// The actor's own stop signal, for racing long work items against stop
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }
}

/// Cloneable address of a running actor
pub struct ActorHandle<M> {
    tx: mpsc::Sender<M>,
    stop: StopSignal,
    name: Arc<str>,
}

impl<M> Clone for ActorHandle<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            stop: self.stop.clone(),
            name: self.name.clone(),
        }
    }
}

impl<M> fmt::Debug for ActorHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("name", &self.name)
            .field("stopped", &self.stop.is_triggered())
            .finish()
    }
}

impl<M: Send + 'static> ActorHandle<M> {
    /// Enqueue a work item
    ///
    /// Waits while the mailbox is full. Fails once the actor has been stopped.
    pub async fn submit(&self, msg: M) -> Result<(), ActorError> {
        if self.stop.is_triggered() {
            return Err(ActorError::Stopped);
        }
        self.tx.send(msg).await.map_err(|_| ActorError::Stopped)
    }

    /// Enqueue a work item carrying a reply slot and wait for the answer
    pub async fn call<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> M,
    ) -> Result<R, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(make(reply_tx)).await?;
        reply_rx.await.map_err(|_| ActorError::NoReply)
    }

    /// Ask the loop to exit after its current item
    ///
    /// Returns true for the call that actually stopped the actor.
    pub fn stop(&self) -> bool {
        let first = self.stop.trigger();
        if first {
            debug!("Actor {} stopping", self.name);
        }
        first
    }

    /// Check whether stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.stop.is_triggered()
    }

    /// Wait until stop has been requested
    pub async fn stopped(&self) {
        self.stop.triggered().await;
    }

    /// Actor name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Spawn an actor loop on the tokio runtime
///
/// Returns the handle used to reach the actor and the loop's join handle.
pub fn spawn<A: Actor>(actor: A, capacity: usize) -> (ActorHandle<A::Message>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let name: Arc<str> = actor.name().into();
    let stop = StopSignal::new();
    let ctx = Context {
        myself: tx.downgrade(),
        stop: stop.clone(),
        name: name.clone(),
    };
    let handle = ActorHandle { tx, stop, name };
    let join = tokio::spawn(run(actor, rx, ctx));
    (handle, join)
}

async fn run<A: Actor>(mut actor: A, mut rx: mpsc::Receiver<A::Message>, ctx: Context<A::Message>) {
    debug!("Actor {} started", ctx.name);

    loop {
        let msg = tokio::select! {
            biased;
            _ = ctx.stop.triggered() => {
                debug!("Actor {} got stop signal", ctx.name);
                break;
            }
            msg = rx.recv() => msg,
        };
        match msg {
            Some(msg) => actor.handle(msg, &ctx).await,
            None => break,
        }
    }

    // Pending items are abandoned, not flushed
    rx.close();
    actor.stopped().await;

    debug!("Actor {} run loop stopped", ctx.name);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::sync::Notify;
    use tokio::time::timeout;

    use super::*;

    enum Work {
        Record(u32),
        Block(Arc<Notify>),
        Snapshot(oneshot::Sender<Vec<u32>>),
    }

    struct Recorder {
        seen: Vec<u32>,
        stops: Arc<AtomicUsize>,
    }

    impl Recorder {
        fn new() -> (Self, Arc<AtomicUsize>) {
            let stops = Arc::new(AtomicUsize::new(0));
            let recorder = Self {
                seen: Vec::new(),
                stops: stops.clone(),
            };
            (recorder, stops)
        }
    }

    impl Actor for Recorder {
        type Message = Work;

        fn name(&self) -> String {
            "recorder".to_string()
        }

        async fn handle(&mut self, msg: Work, _ctx: &Context<Work>) {
            match msg {
                Work::Record(n) => self.seen.push(n),
                Work::Block(release) => release.notified().await,
                Work::Snapshot(reply) => {
                    let _ = reply.send(self.seen.clone());
                }
            }
        }

        async fn stopped(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_items_run_in_submission_order() {
        let (recorder, _) = Recorder::new();
        let (handle, _join) = spawn(recorder, MAILBOX_CAPACITY);

        for n in 0..50 {
            handle.submit(Work::Record(n)).await.unwrap();
        }
        let seen = handle.call(Work::Snapshot).await.unwrap();

        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (recorder, stops) = Recorder::new();
        let (handle, join) = spawn(recorder, MAILBOX_CAPACITY);

        assert!(handle.stop());
        assert!(!handle.stop());
        assert!(!handle.clone().stop());
        join.await.unwrap();

        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn test_submit_after_stop_fails() {
        let (recorder, _) = Recorder::new();
        let (handle, join) = spawn(recorder, MAILBOX_CAPACITY);

        handle.stop();
        join.await.unwrap();

        assert!(matches!(
            handle.submit(Work::Record(1)).await,
            Err(ActorError::Stopped)
        ));
        assert!(matches!(
            handle.call(Work::Snapshot).await,
            Err(ActorError::Stopped)
        ));
    }

    #[tokio::test]
    async fn test_full_mailbox_blocks_submitter() {
        let (recorder, _) = Recorder::new();
        let (handle, _join) = spawn(recorder, MAILBOX_CAPACITY);

        let release = Arc::new(Notify::new());
        handle.submit(Work::Block(release.clone())).await.unwrap();
        // Give the loop time to pick up the blocking item
        tokio::time::sleep(Duration::from_millis(20)).await;

        for n in 0..MAILBOX_CAPACITY as u32 {
            handle.submit(Work::Record(n)).await.unwrap();
        }
        let blocked = timeout(Duration::from_millis(50), handle.submit(Work::Record(99))).await;
        assert!(blocked.is_err(), "submit should wait while the mailbox is full");

        release.notify_one();
        timeout(Duration::from_secs(1), handle.submit(Work::Record(99)))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_abandons_queued_items() {
        let (recorder, stops) = Recorder::new();
        let (handle, join) = spawn(recorder, MAILBOX_CAPACITY);

        let release = Arc::new(Notify::new());
        handle.submit(Work::Block(release.clone())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (reply_tx, reply_rx) = oneshot::channel();
        handle.submit(Work::Snapshot(reply_tx)).await.unwrap();
        handle.stop();
        release.notify_one();
        join.await.unwrap();

        // The queued snapshot never ran, so its reply slot was dropped
        assert!(reply_rx.await.is_err());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_signal_fires_once() {
        let signal = StopSignal::new();
        let shared = signal.clone();

        assert!(!signal.is_triggered());
        assert!(shared.trigger());
        assert!(!signal.trigger());
        assert!(signal.is_triggered());
    }
}
