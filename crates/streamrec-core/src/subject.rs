//! Hot publishers driven by hand.
//!
//! Subjects route values to every current subscriber, the way an event bus
//! routes published events. [`PassthroughSubject`] only forwards what is sent
//! after a subscriber attaches. [`CurrentValueSubject`] also remembers the
//! latest value and hands it to each new subscriber first, which is how an
//! observable property behaves.
//!
//! Once a completion is sent the subject is terminated: later values are
//! dropped and later subscribers immediately receive the stored completion.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use streamrec_proto::{AnyCancellable, Completion, Publisher, Subscriber};
use tracing::{debug, trace};

type SubscriberRef<O, E> = Arc<dyn Subscriber<O, E>>;

/// What a subject replays to a new subscriber.
trait Replay<O>: Send {
    fn replay(&self) -> Option<O>;
    fn update(&mut self, value: &O);
}

impl<O> Replay<O> for () {
    fn replay(&self) -> Option<O> {
        None
    }

    fn update(&mut self, _: &O) {}
}

/// Latest value sent to a [`CurrentValueSubject`].
struct Latest<O>(O);

impl<O: Clone + Send> Replay<O> for Latest<O> {
    fn replay(&self) -> Option<O> {
        Some(self.0.clone())
    }

    fn update(&mut self, value: &O) {
        self.0 = value.clone();
    }
}

enum Signal<O, E> {
    Value(O),
    Completion(Completion<E>),
}

/// A signal and the subscribers that were attached when it was accepted.
struct Delivery<O, E> {
    recipients: Vec<SubscriberRef<O, E>>,
    signal: Signal<O, E>,
}

impl<O: Clone, E: Clone> Delivery<O, E> {
    fn deliver(self) {
        match self.signal {
            Signal::Value(value) => {
                for subscriber in &self.recipients {
                    subscriber.receive(value.clone());
                }
            }
            Signal::Completion(completion) => {
                for subscriber in &self.recipients {
                    subscriber.receive_completion(completion.clone());
                }
            }
        }
    }
}

struct State<O, E, R> {
    replay: R,
    subscribers: Vec<(u64, SubscriberRef<O, E>)>,
    next_id: u64,
    completion: Option<Completion<E>>,

    /// Accepted signals not yet handed to their recipients.
    queue: VecDeque<Delivery<O, E>>,

    /// True while some caller is draining `queue`.
    draining: bool,
}

/// Subscriber registry shared by the subject types.
///
/// Signals are queued in the order the subject accepts them and delivered by
/// whichever caller finds no drain in progress, so subscribers see one
/// ordered sequence even when several threads send at once. A subscriber
/// that sends from inside a callback has its signal queued behind the one
/// being delivered.
struct Broadcast<O, E, R> {
    state: Mutex<State<O, E, R>>,
}

impl<O, E, R> Broadcast<O, E, R>
where
    O: Clone + Send + 'static,
    E: Clone + Send + 'static,
    R: Replay<O> + 'static,
{
    fn new(replay: R) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                replay,
                subscribers: Vec::new(),
                next_id: 0,
                completion: None,
                queue: VecDeque::new(),
                draining: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State<O, E, R>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queues `delivery` and drains the queue unless another caller already is.
    fn dispatch<'a>(&'a self, mut state: MutexGuard<'a, State<O, E, R>>, delivery: Delivery<O, E>) {
        state.queue.push_back(delivery);
        if state.draining {
            return;
        }
        state.draining = true;

        loop {
            let Some(next) = state.queue.pop_front() else {
                state.draining = false;
                return;
            };
            drop(state);
            next.deliver();
            state = self.lock();
        }
    }

    fn subscribe(self: &Arc<Self>, subscriber: SubscriberRef<O, E>) -> AnyCancellable {
        let mut state = self.lock();

        if let Some(completion) = state.completion.clone() {
            drop(state);
            trace!("Subscribed to terminated subject; replaying completion");
            subscriber.receive_completion(completion);
            return AnyCancellable::empty();
        }

        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, Arc::clone(&subscriber)));
        debug!(
            subscriber_id = id,
            subscribers = state.subscribers.len(),
            "Subscriber attached to subject"
        );

        match state.replay.replay() {
            Some(value) => self.dispatch(
                state,
                Delivery {
                    recipients: vec![subscriber],
                    signal: Signal::Value(value),
                },
            ),
            None => drop(state),
        }

        let broadcast = Arc::downgrade(self);
        AnyCancellable::new(move || {
            if let Some(broadcast) = broadcast.upgrade() {
                broadcast.remove(id);
            }
        })
    }

    fn remove(&self, id: u64) {
        let removed = {
            let mut state = self.lock();
            let index = state
                .subscribers
                .iter()
                .position(|(existing, _)| *existing == id);
            index.map(|index| state.subscribers.remove(index))
        };
        // Dropped outside the lock; the subscriber's drop may call back in.
        if removed.is_some() {
            debug!(subscriber_id = id, "Subscriber detached from subject");
        }
    }

    fn send(&self, value: O) {
        let mut state = self.lock();
        if state.completion.is_some() {
            trace!("Dropping value sent to terminated subject");
            return;
        }
        state.replay.update(&value);
        let recipients = state.subscribers.iter().map(|(_, s)| Arc::clone(s)).collect();
        self.dispatch(
            state,
            Delivery {
                recipients,
                signal: Signal::Value(value),
            },
        );
    }

    fn send_completion(&self, completion: Completion<E>) {
        let mut state = self.lock();
        if state.completion.is_some() {
            trace!("Ignoring repeated completion on terminated subject");
            return;
        }
        state.completion = Some(completion.clone());
        let recipients: Vec<SubscriberRef<O, E>> = std::mem::take(&mut state.subscribers)
            .into_iter()
            .map(|(_, subscriber)| subscriber)
            .collect();

        debug!(
            kind = completion.kind(),
            subscribers = recipients.len(),
            "Subject terminated"
        );
        self.dispatch(
            state,
            Delivery {
                recipients,
                signal: Signal::Completion(completion),
            },
        );
    }

    fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn is_terminated(&self) -> bool {
        self.lock().completion.is_some()
    }
}

/// Forwards sent values to whoever is subscribed at the time.
///
/// Clones share the same subscribers.
pub struct PassthroughSubject<O, E> {
    inner: Arc<Broadcast<O, E, ()>>,
}

impl<O, E> PassthroughSubject<O, E>
where
    O: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a subject with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Broadcast::new(()),
        }
    }

    /// Delivers `value` to every current subscriber.
    pub fn send(&self, value: O) {
        self.inner.send(value);
    }

    /// Terminates the subject and delivers `completion` to every subscriber.
    pub fn send_completion(&self, completion: Completion<E>) {
        self.inner.send_completion(completion);
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }

    /// Returns true once a completion has been sent.
    pub fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

impl<O, E> Default for PassthroughSubject<O, E>
where
    O: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<O, E> Clone for PassthroughSubject<O, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O, E> Publisher for PassthroughSubject<O, E>
where
    O: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = O;
    type Failure = E;

    fn subscribe(&self, subscriber: SubscriberRef<O, E>) -> AnyCancellable {
        self.inner.subscribe(subscriber)
    }
}

impl<O, E> fmt::Debug for PassthroughSubject<O, E>
where
    O: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassthroughSubject")
            .field("subscribers", &self.subscriber_count())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Holds a current value and replays it to each new subscriber.
///
/// Clones share the same value and subscribers.
pub struct CurrentValueSubject<O, E> {
    inner: Arc<Broadcast<O, E, Latest<O>>>,
}

impl<O, E> CurrentValueSubject<O, E>
where
    O: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a subject holding `value`.
    pub fn new(value: O) -> Self {
        Self {
            inner: Broadcast::new(Latest(value)),
        }
    }

    /// Returns the current value.
    pub fn value(&self) -> O {
        self.inner.lock().replay.0.clone()
    }

    /// Replaces the current value and delivers it to every subscriber.
    ///
    /// Ignored once the subject has terminated.
    pub fn send(&self, value: O) {
        self.inner.send(value);
    }

    /// Terminates the subject and delivers `completion` to every subscriber.
    pub fn send_completion(&self, completion: Completion<E>) {
        self.inner.send_completion(completion);
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }

    /// Returns true once a completion has been sent.
    pub fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

impl<O, E> Clone for CurrentValueSubject<O, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O, E> Publisher for CurrentValueSubject<O, E>
where
    O: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = O;
    type Failure = E;

    fn subscribe(&self, subscriber: SubscriberRef<O, E>) -> AnyCancellable {
        self.inner.subscribe(subscriber)
    }
}

impl<O, E> fmt::Debug for CurrentValueSubject<O, E>
where
    O: Clone + Send + fmt::Debug + 'static,
    E: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentValueSubject")
            .field("value", &self.value())
            .field("subscribers", &self.subscriber_count())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PublisherExt;
    use std::convert::Infallible;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    type Collected<O, E> = (
        AnyCancellable,
        Arc<Mutex<Vec<O>>>,
        Arc<Mutex<Vec<Completion<E>>>>,
    );

    fn collecting<O, E>(publisher: &impl Publisher<Output = O, Failure = E>) -> Collected<O, E>
    where
        O: Send + 'static,
        E: Send + 'static,
    {
        let values = Arc::new(Mutex::new(Vec::new()));
        let completions = Arc::new(Mutex::new(Vec::new()));
        let values_clone = Arc::clone(&values);
        let completions_clone = Arc::clone(&completions);
        let handle = publisher.sink(
            move |c| completions_clone.lock().unwrap().push(c),
            move |v| values_clone.lock().unwrap().push(v),
        );
        (handle, values, completions)
    }

    #[test]
    fn test_passthrough_routes_to_all_subscribers() {
        let subject = PassthroughSubject::<u8, Infallible>::new();
        let (_a, first, _) = collecting(&subject);
        let (_b, second, _) = collecting(&subject);

        subject.send(1);
        subject.send(2);

        assert_eq!(*first.lock().unwrap(), vec![1, 2]);
        assert_eq!(*second.lock().unwrap(), vec![1, 2]);
        assert_eq!(subject.subscriber_count(), 2);
    }

    #[test]
    fn test_passthrough_does_not_replay() {
        let subject = PassthroughSubject::<u8, Infallible>::new();
        subject.send(1);

        let (_handle, values, _) = collecting(&subject);
        assert!(values.lock().unwrap().is_empty());
    }

    #[test]
    fn test_completion_releases_subscribers() {
        let subject = PassthroughSubject::<u8, String>::new();
        let (_handle, values, completions) = collecting(&subject);

        subject.send_completion(Completion::Failure("done".to_string()));
        subject.send(9);
        subject.send_completion(Completion::Finished);

        assert!(subject.is_terminated());
        assert_eq!(subject.subscriber_count(), 0);
        assert!(values.lock().unwrap().is_empty());
        assert_eq!(
            *completions.lock().unwrap(),
            vec![Completion::Failure("done".to_string())]
        );
    }

    #[test]
    fn test_late_subscriber_receives_stored_completion() {
        let subject = PassthroughSubject::<u8, Infallible>::new();
        subject.send_completion(Completion::Finished);

        let (handle, _, completions) = collecting(&subject);

        assert!(handle.is_cancelled());
        assert_eq!(*completions.lock().unwrap(), vec![Completion::Finished]);
    }

    #[test]
    fn test_cancel_detaches_only_that_subscriber() {
        let subject = PassthroughSubject::<u8, Infallible>::new();
        let (first_handle, first, _) = collecting(&subject);
        let (_second_handle, second, _) = collecting(&subject);

        subject.send(1);
        drop(first_handle);
        subject.send(2);

        assert_eq!(*first.lock().unwrap(), vec![1]);
        assert_eq!(*second.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_subscriber_may_send_reentrantly() {
        let subject = PassthroughSubject::<u8, Infallible>::new();
        let echo = subject.clone();
        let _handle = subject.sink(
            |_| {},
            move |v| {
                if v == 0 {
                    echo.send(1);
                }
            },
        );
        let (_watch, values, _) = collecting(&subject);

        subject.send(0);

        assert_eq!(*values.lock().unwrap(), vec![0, 1]);
    }

    /// Subscribes a callback that reports entry and then stalls, so a second
    /// sender arrives while the first delivery is still running.
    fn stall_on_first_value<E>(
        subject: &PassthroughSubject<u8, E>,
    ) -> (AnyCancellable, mpsc::Receiver<()>)
    where
        E: Clone + Send + 'static,
    {
        let (entered_tx, entered_rx) = mpsc::channel();
        let entered_tx = Mutex::new(Some(entered_tx));
        let handle = subject.sink(
            |_| {},
            move |_| {
                if let Some(tx) = entered_tx.lock().unwrap().take() {
                    tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(50));
                }
            },
        );
        (handle, entered_rx)
    }

    #[test]
    fn test_concurrent_sends_arrive_in_accepted_order() {
        let subject = PassthroughSubject::<u8, Infallible>::new();
        let (_slow, entered) = stall_on_first_value(&subject);
        let recorder = subject.record();

        let first = {
            let subject = subject.clone();
            thread::spawn(move || subject.send(1))
        };
        entered.recv().unwrap();
        subject.send(2);
        first.join().unwrap();

        assert_eq!(recorder.outputs(), vec![1, 2]);
    }

    #[test]
    fn test_completion_does_not_overtake_accepted_value() {
        let subject = PassthroughSubject::<u8, Infallible>::new();
        let (_slow, entered) = stall_on_first_value(&subject);
        let recorder = subject.record();

        let first = {
            let subject = subject.clone();
            thread::spawn(move || subject.send(7))
        };
        entered.recv().unwrap();
        subject.send_completion(Completion::Finished);
        first.join().unwrap();

        assert_eq!(recorder.outputs(), vec![7]);
        assert_eq!(recorder.terminal_event(), Some(Completion::Finished));
    }

    #[test]
    fn test_current_value_replay_precedes_later_sends() {
        let subject = CurrentValueSubject::<u8, Infallible>::new(0);
        let echo = subject.clone();
        let _handle = subject.sink(
            |_| {},
            move |v| {
                if v == 1 {
                    echo.send(2);
                }
            },
        );
        let recorder = subject.record();

        subject.send(1);

        assert_eq!(recorder.outputs(), vec![0, 1, 2]);
        assert_eq!(subject.value(), 2);
    }

    #[test]
    fn test_current_value_replays_latest() {
        let subject = CurrentValueSubject::<u8, Infallible>::new(1);
        subject.send(2);

        let (_handle, values, _) = collecting(&subject);
        subject.send(3);

        assert_eq!(*values.lock().unwrap(), vec![2, 3]);
        assert_eq!(subject.value(), 3);
    }

    #[test]
    fn test_current_value_keeps_value_after_termination() {
        let subject = CurrentValueSubject::<u8, Infallible>::new(5);
        subject.send_completion(Completion::Finished);
        subject.send(6);

        assert_eq!(subject.value(), 5);
        let (_handle, values, completions) = collecting(&subject);
        assert!(values.lock().unwrap().is_empty());
        assert_eq!(*completions.lock().unwrap(), vec![Completion::Finished]);
    }

    #[test]
    fn test_debug_reports_state() {
        let subject = CurrentValueSubject::<u8, Infallible>::new(7);
        let debug = format!("{:?}", subject);
        assert!(debug.contains("value: 7"));
        assert!(debug.contains("terminated: false"));
    }
}
