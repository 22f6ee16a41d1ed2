//! The receiving side of a subscription.

use crate::Completion;
use std::fmt;

/// Receives values and the terminal event from a publisher.
///
/// Publishers call [`receive`](Self::receive) once per emitted value and then
/// [`receive_completion`](Self::receive_completion) at most once. Methods take
/// `&self` so one subscriber can be shared behind an `Arc` and called from
/// whichever thread the publisher delivers on.
pub trait Subscriber<O, E>: Send + Sync {
    /// Called once per emitted value, in emission order.
    fn receive(&self, value: O);

    /// Called at most once, after every value.
    fn receive_completion(&self, completion: Completion<E>);
}

type ValueCallback<O> = Box<dyn Fn(O) + Send + Sync + 'static>;
type CompletionCallback<E> = Box<dyn Fn(Completion<E>) + Send + Sync + 'static>;

/// A [`Subscriber`] assembled from two closures.
pub struct Sink<O, E> {
    receive_value: ValueCallback<O>,
    receive_completion: CompletionCallback<E>,
}

impl<O, E> Sink<O, E> {
    /// Creates a sink from a completion callback and a value callback.
    pub fn new<C, V>(receive_completion: C, receive_value: V) -> Self
    where
        C: Fn(Completion<E>) + Send + Sync + 'static,
        V: Fn(O) + Send + Sync + 'static,
    {
        Self {
            receive_value: Box::new(receive_value),
            receive_completion: Box::new(receive_completion),
        }
    }

    /// Creates a sink that only observes values.
    pub fn values<V>(receive_value: V) -> Self
    where
        V: Fn(O) + Send + Sync + 'static,
    {
        Self::new(|_| {}, receive_value)
    }
}

impl<O, E> Subscriber<O, E> for Sink<O, E> {
    fn receive(&self, value: O) {
        (self.receive_value)(value);
    }

    fn receive_completion(&self, completion: Completion<E>) {
        (self.receive_completion)(completion);
    }
}

impl<O, E> fmt::Debug for Sink<O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").finish_non_exhaustive()
    }
}
