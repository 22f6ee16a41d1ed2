//! The `record` entry point.

use crate::{RecorderConfig, StreamRecorder};
use streamrec_proto::Publisher;

/// Adds [`record`](Self::record) to every [`Publisher`].
pub trait PublisherExt: Publisher {
    /// Subscribes a new [`StreamRecorder`] with the default configuration.
    ///
    /// Only values emitted after this call are recorded.
    fn record(&self) -> StreamRecorder<Self::Output, Self::Failure>
    where
        Self::Output: Send + 'static,
        Self::Failure: Send + 'static,
    {
        self.record_with(RecorderConfig::default())
    }

    /// Subscribes a new [`StreamRecorder`] with the given configuration.
    fn record_with(&self, config: RecorderConfig) -> StreamRecorder<Self::Output, Self::Failure>
    where
        Self::Output: Send + 'static,
        Self::Failure: Send + 'static,
    {
        StreamRecorder::attach(self, config)
    }
}

impl<P: Publisher + ?Sized> PublisherExt for P {}

/// Subscribes a new [`StreamRecorder`] to `publisher`.
pub fn record<P>(publisher: &P) -> StreamRecorder<P::Output, P::Failure>
where
    P: Publisher + ?Sized,
    P::Output: Send + 'static,
    P::Failure: Send + 'static,
{
    publisher.record()
}
