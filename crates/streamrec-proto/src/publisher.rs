//! The observable stream capability.

use crate::{AnyCancellable, Completion, Sink, Subscriber};
use std::sync::Arc;

/// A source that emits zero or more values and then at most one [`Completion`].
///
/// Implementors deliver values to the subscriber in emission order and never
/// deliver anything after the completion. Dropping or cancelling the returned
/// handle detaches the subscriber.
pub trait Publisher {
    /// Type of emitted values.
    type Output;

    /// Error carried by a failed completion.
    type Failure;

    /// Attaches a subscriber and returns the handle owning the subscription.
    fn subscribe(
        &self,
        subscriber: Arc<dyn Subscriber<Self::Output, Self::Failure>>,
    ) -> AnyCancellable;

    /// Attaches a pair of closures.
    fn sink<C, V>(&self, receive_completion: C, receive_value: V) -> AnyCancellable
    where
        Self: Sized,
        Self::Output: 'static,
        Self::Failure: 'static,
        C: Fn(Completion<Self::Failure>) + Send + Sync + 'static,
        V: Fn(Self::Output) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(Sink::new(receive_completion, receive_value)))
    }
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(
        &self,
        subscriber: Arc<dyn Subscriber<Self::Output, Self::Failure>>,
    ) -> AnyCancellable {
        (**self).subscribe(subscriber)
    }
}

impl<P: Publisher + ?Sized> Publisher for &P {
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(
        &self,
        subscriber: Arc<dyn Subscriber<Self::Output, Self::Failure>>,
    ) -> AnyCancellable {
        (**self).subscribe(subscriber)
    }
}
