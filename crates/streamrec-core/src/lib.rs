//! # streamrec-core
//!
//! Records what a publisher emits so tests can assert on it afterwards.
//!
//! This crate provides:
//! - [`StreamRecorder`], which stores every value and the terminal event
//! - [`PublisherExt::record`] (and the free [`record`] function) to attach one
//! - [`PassthroughSubject`] and [`CurrentValueSubject`] for driving values by hand
//! - [`StreamPublisher`] to record any `futures::Stream`
//! - [`RecorderConfig`] and [`Snapshot`] for shared settings and golden files

mod config;
mod record;
mod recorder;
mod snapshot;
mod stream_publisher;
mod subject;

pub use config::{ConfigError, RecorderConfig};
pub use record::{PublisherExt, record};
pub use recorder::StreamRecorder;
pub use snapshot::Snapshot;
pub use stream_publisher::StreamPublisher;
pub use subject::{CurrentValueSubject, PassthroughSubject};
