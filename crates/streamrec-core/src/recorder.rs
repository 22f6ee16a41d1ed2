//! Stream recorder.
//!
//! `StreamRecorder` attaches to a [`Publisher`], appends every emitted value
//! in arrival order, and keeps the terminal event once it arrives. The
//! recorder owns the subscription: dropping the recorder (or calling
//! [`cancel`](StreamRecorder::cancel)) detaches it from the publisher.
//!
//! The subscription callbacks only hold a `Weak` reference to the recorded
//! state. A publisher that outlives the recorder keeps calling into a dead
//! reference, which is a no-op.

use crate::RecorderConfig;
use crate::snapshot::Snapshot;
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use streamrec_proto::{AnyCancellable, Cancellable, Completion, Error, Publisher, Result, Sink};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Values and terminal event observed so far.
pub(crate) struct Recording<O, E> {
    pub(crate) outputs: Vec<O>,
    pub(crate) completion: Option<Completion<E>>,
    /// Set once the publisher released the subscriber or the recorder cancelled.
    detached: bool,
}

/// State shared between the recorder and its subscription callbacks.
struct Shared<O, E> {
    recording: Mutex<Recording<O, E>>,

    /// Bumped after every change so async waiters can re-check.
    version: watch::Sender<u64>,

    label: Option<String>,
}

impl<O, E> Shared<O, E> {
    fn new(label: Option<String>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            recording: Mutex::new(Recording {
                outputs: Vec::new(),
                completion: None,
                detached: false,
            }),
            version,
            label,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recording<O, E>> {
        match self.recording.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("unlabelled")
    }

    fn notify(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn push_output(&self, value: O) {
        let index = {
            let mut recording = self.lock();
            if recording.detached {
                trace!(label = self.label(), "Ignoring value delivered after detach");
                return;
            }
            if recording.completion.is_some() {
                trace!(label = self.label(), "Ignoring value delivered after terminal event");
                return;
            }
            recording.outputs.push(value);
            recording.outputs.len() - 1
        };
        trace!(label = self.label(), index, "Recorded output");
        self.notify();
    }

    fn finish(&self, completion: Completion<E>) {
        let kind = completion.kind();
        {
            let mut recording = self.lock();
            if recording.detached {
                trace!(label = self.label(), kind, "Ignoring terminal event delivered after detach");
                return;
            }
            if recording.completion.is_some() {
                trace!(label = self.label(), kind, "Ignoring repeated terminal event");
                return;
            }
            recording.completion = Some(completion);
        }
        debug!(label = self.label(), kind, "Recorded terminal event");
        self.notify();
    }

    fn detach(&self) {
        self.lock().detached = true;
        self.notify();
    }
}

/// Marks the recording detached when the publisher drops its subscriber.
struct DetachGuard<O, E>(Weak<Shared<O, E>>);

impl<O, E> DetachGuard<O, E> {
    fn upgrade(&self) -> Option<Arc<Shared<O, E>>> {
        self.0.upgrade()
    }
}

impl<O, E> Drop for DetachGuard<O, E> {
    fn drop(&mut self) {
        if let Some(shared) = self.0.upgrade() {
            shared.detach();
        }
    }
}

/// Records the values and terminal event of one publisher.
///
/// Created by [`PublisherExt::record`](crate::PublisherExt::record).
///
/// # Example
///
/// ```
/// use streamrec_core::{PassthroughSubject, PublisherExt};
/// use streamrec_proto::Completion;
///
/// let subject = PassthroughSubject::<i32, String>::new();
/// let recorder = subject.record();
///
/// subject.send(1);
/// subject.send(2);
/// subject.send_completion(Completion::Finished);
///
/// assert_eq!(recorder.outputs(), vec![1, 2]);
/// assert_eq!(recorder.terminal_event(), Some(Completion::Finished));
/// ```
pub struct StreamRecorder<O, E> {
    subscription: AnyCancellable,
    shared: Arc<Shared<O, E>>,
    cancelled: AtomicBool,
    config: RecorderConfig,
}

impl<O, E> StreamRecorder<O, E>
where
    O: Send + 'static,
    E: Send + 'static,
{
    /// Subscribes a new recorder to `publisher`.
    pub(crate) fn attach<P>(publisher: &P, config: RecorderConfig) -> Self
    where
        P: Publisher<Output = O, Failure = E> + ?Sized,
    {
        let shared = Arc::new(Shared::new(config.label.clone()));

        let on_value = Arc::downgrade(&shared);
        let on_completion = DetachGuard(Arc::downgrade(&shared));
        let sink = Sink::new(
            move |completion| {
                if let Some(shared) = on_completion.upgrade() {
                    shared.finish(completion);
                }
            },
            move |value| {
                if let Some(shared) = on_value.upgrade() {
                    shared.push_output(value);
                }
            },
        );

        debug!(label = shared.label(), "Attaching recorder");
        let subscription = publisher.subscribe(Arc::new(sink));

        Self {
            subscription,
            shared,
            cancelled: AtomicBool::new(false),
            config,
        }
    }
}

impl<O, E> StreamRecorder<O, E> {
    /// Returns the values recorded so far, in emission order.
    pub fn outputs(&self) -> Vec<O>
    where
        O: Clone,
    {
        self.shared.lock().outputs.clone()
    }

    /// Runs `f` against the recorded values without cloning them.
    pub fn with_outputs<R>(&self, f: impl FnOnce(&[O]) -> R) -> R {
        f(&self.shared.lock().outputs)
    }

    /// Number of values recorded so far.
    pub fn output_count(&self) -> usize {
        self.shared.lock().outputs.len()
    }

    /// Returns the terminal event, if the stream has finished.
    pub fn terminal_event(&self) -> Option<Completion<E>>
    where
        E: Clone,
    {
        self.shared.lock().completion.clone()
    }

    /// Returns true once a terminal event has been recorded.
    pub fn is_terminated(&self) -> bool {
        self.shared.lock().completion.is_some()
    }

    /// Releases the subscription. Calling it again, or after the stream
    /// terminated, has no further effect.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(label = self.shared.label(), "Cancelling recorder subscription");
        self.subscription.cancel();
        self.shared.detach();
    }

    /// Returns true if [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Label from the recorder's configuration.
    pub fn label(&self) -> Option<&str> {
        self.config.label.as_deref()
    }

    /// Configuration the recorder was created with.
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Copies the current state into a serialisable [`Snapshot`].
    pub fn snapshot(&self) -> Snapshot<O, E>
    where
        O: Clone,
        E: Clone,
    {
        let recording = self.shared.lock();
        Snapshot {
            label: self.config.label.clone(),
            outputs: recording.outputs.clone(),
            completion: recording.completion.clone(),
        }
    }

    /// Writes the current state as JSON lines.
    ///
    /// See [`Snapshot::write_jsonl`] for the format.
    pub fn write_jsonl<W: Write>(&self, writer: W) -> std::io::Result<()>
    where
        O: Clone + serde::Serialize,
        E: Clone + serde::Serialize,
    {
        self.snapshot().write_jsonl(writer)
    }

    /// Waits until at least `count` values have been recorded and returns them.
    ///
    /// Gives up after the configured wait timeout.
    pub async fn wait_for_outputs(&self, count: usize) -> Result<Vec<O>>
    where
        O: Clone,
    {
        self.wait_for(
            |recording| (recording.outputs.len() >= count).then(|| recording.outputs.clone()),
            self.config.wait_timeout(),
        )
        .await
    }

    /// Waits for the terminal event.
    ///
    /// Gives up after the configured wait timeout.
    pub async fn wait_for_completion(&self) -> Result<Completion<E>>
    where
        E: Clone,
    {
        self.wait_for(
            |recording| recording.completion.clone(),
            self.config.wait_timeout(),
        )
        .await
    }

    /// Waits until `predicate` holds for the recorded values and terminal event.
    pub async fn wait_until<F>(&self, mut predicate: F, timeout: Duration) -> Result<()>
    where
        F: FnMut(&[O], Option<&Completion<E>>) -> bool,
    {
        self.wait_for(
            |recording| predicate(&recording.outputs, recording.completion.as_ref()).then_some(()),
            timeout,
        )
        .await
    }

    async fn wait_for<T, F>(&self, mut extract: F, timeout: Duration) -> Result<T>
    where
        F: FnMut(&Recording<O, E>) -> Option<T>,
    {
        // Subscribe before the first check so no change slips in between.
        let mut changes = self.shared.version.subscribe();
        let wait = async {
            loop {
                {
                    let recording = self.shared.lock();
                    if let Some(found) = extract(&recording) {
                        return Ok(found);
                    }
                    if recording.completion.is_some() {
                        return Err(Error::Terminated);
                    }
                    if recording.detached {
                        return Err(Error::Cancelled);
                    }
                }
                if changes.changed().await.is_err() {
                    return Err(Error::Cancelled);
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                debug!(label = self.shared.label(), waited = ?timeout, "Wait on recording timed out");
                Err(Error::Timeout { waited: timeout })
            }
        }
    }
}

impl<O, E> fmt::Debug for StreamRecorder<O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let recording = self.shared.lock();
        f.debug_struct("StreamRecorder")
            .field("label", &self.config.label)
            .field("outputs", &recording.outputs.len())
            .field(
                "completion",
                &recording.completion.as_ref().map(Completion::kind),
            )
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
