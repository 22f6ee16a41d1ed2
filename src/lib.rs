//! # streamrec
//!
//! Record everything a publisher emits, then assert on it.
//!
//! ```
//! use streamrec::{Completion, PassthroughSubject, PublisherExt};
//!
//! let subject = PassthroughSubject::<u32, String>::new();
//! let recorder = subject.record();
//!
//! subject.send(1);
//! subject.send_completion(Completion::Failure("offline".to_string()));
//!
//! assert_eq!(recorder.outputs(), vec![1]);
//! assert_eq!(
//!     recorder.terminal_event(),
//!     Some(Completion::Failure("offline".to_string()))
//! );
//! ```
//!
//! The workspace is split into [`streamrec_proto`] (the publisher capability
//! and shared types) and [`streamrec_core`] (the recorder and publishers).
//! Everything commonly needed is re-exported here.

pub use streamrec_core::{
    ConfigError, CurrentValueSubject, PassthroughSubject, PublisherExt, RecorderConfig, Snapshot,
    StreamPublisher, StreamRecorder, record,
};
pub use streamrec_proto::{
    AnyCancellable, Cancellable, Completion, Error, Publisher, Result, Sink, Subscriber,
};
