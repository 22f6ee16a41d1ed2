//! # streamrec-proto
//!
//! Shared types and traits for the streamrec workspace.
//!
//! This crate describes the observable stream capability that the recorder
//! attaches to:
//! - [`Publisher`] emits values and at most one [`Completion`]
//! - [`Subscriber`] and the closure-based [`Sink`] receive them
//! - [`AnyCancellable`] owns a subscription and detaches it on cancel or drop
//! - [`Error`] is returned by the waiting helpers

mod cancellable;
mod completion;
mod error;
mod publisher;
mod subscriber;

pub use cancellable::{AnyCancellable, Cancellable};
pub use completion::Completion;
pub use error::{Error, Result};
pub use publisher::Publisher;
pub use subscriber::{Sink, Subscriber};
