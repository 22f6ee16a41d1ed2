//! Adapter from `futures::Stream` to [`Publisher`].
//!
//! Each subscription builds a fresh stream from the factory and drives it on
//! its own Tokio task. `Ok` items become values, the first `Err` becomes a
//! failed completion, and exhaustion becomes `Finished`. Cancelling the
//! subscription aborts the task.

use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use streamrec_proto::{AnyCancellable, Completion, Publisher, Subscriber};
use tracing::debug;

/// Cold publisher backed by a stream factory.
pub struct StreamPublisher<F> {
    factory: F,
}

impl<F> StreamPublisher<F> {
    /// Wraps a factory producing a `Stream<Item = Result<O, E>>`.
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

type InfallibleItem<S> = fn(<S as Stream>::Item) -> Result<<S as Stream>::Item, Infallible>;

impl StreamPublisher<()> {
    /// Wraps a factory producing a stream that cannot fail.
    pub fn infallible<G, S>(
        factory: G,
    ) -> StreamPublisher<impl Fn() -> futures::stream::Map<S, InfallibleItem<S>>>
    where
        G: Fn() -> S,
        S: Stream,
    {
        StreamPublisher::new(move || factory().map(Ok as InfallibleItem<S>))
    }
}

impl<F, S, O, E> Publisher for StreamPublisher<F>
where
    F: Fn() -> S,
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    type Output = O;
    type Failure = E;

    /// Spawns the task driving a new stream.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<O, E>>) -> AnyCancellable {
        let stream = (self.factory)();
        let task = tokio::spawn(drive(stream, subscriber));
        debug!("Spawned stream subscription task");
        AnyCancellable::new(move || {
            if !task.is_finished() {
                debug!("Aborting stream subscription task");
                task.abort();
            }
        })
    }
}

async fn drive<S, O, E>(stream: S, subscriber: Arc<dyn Subscriber<O, E>>)
where
    S: Stream<Item = Result<O, E>>,
{
    let mut stream = std::pin::pin!(stream);
    while let Some(item) = stream.next().await {
        match item {
            Ok(value) => subscriber.receive(value),
            Err(error) => {
                subscriber.receive_completion(Completion::Failure(error));
                return;
            }
        }
    }
    subscriber.receive_completion(Completion::Finished);
}

impl<F> fmt::Debug for StreamPublisher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamPublisher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_items_then_finished() {
        let publisher = StreamPublisher::new(|| stream::iter(vec![Ok::<_, String>(1), Ok(2)]));
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let done_tx = Mutex::new(Some(done_tx));
        let values = Arc::new(Mutex::new(Vec::new()));
        let values_clone = Arc::clone(&values);

        let _handle = publisher.sink(
            move |completion| {
                if let Some(tx) = done_tx.lock().unwrap().take() {
                    let _ = tx.send(completion);
                }
            },
            move |v| values_clone.lock().unwrap().push(v),
        );

        let completion = done_rx.await.unwrap();
        assert_eq!(completion, Completion::Finished);
        assert_eq!(*values.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_cancel_aborts_task() {
        let publisher = StreamPublisher::infallible(|| {
            stream::unfold(0u32, |n| async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Some((n, n + 1))
            })
        });
        let values = Arc::new(Mutex::new(Vec::new()));
        let values_clone = Arc::clone(&values);

        let handle = publisher.sink(|_| {}, move |v| values_clone.lock().unwrap().push(v));
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(handle);
        let seen = values.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(values.lock().unwrap().len(), seen);
    }
}
