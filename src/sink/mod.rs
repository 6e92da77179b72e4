// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Destinations for log events.

use std::fmt;

use crate::Error;
use crate::level::Level;
use crate::level::LeveledEvent;
use crate::loggable::Loggable;

mod fanout;
pub mod file;

pub use self::fanout::FanOut;
pub use self::fanout::FanOutBuilder;

/// A destination that durably records log events.
///
/// All methods take `&self`; implementations synchronize internally so that every method may be
/// called concurrently from any number of threads.
///
/// The severity shortcuts ([`critical`](Sink::critical), [`warn`](Sink::warn), ...) take one
/// displayable value. Join several values into one message first, with `format_args!` or
/// `format!`:
///
/// ```
/// use faultlog::sink::Sink;
/// use faultlog::sink::file::FileSink;
///
/// let dir = tempfile::tempdir().unwrap();
/// let sink = FileSink::new(dir.path().join("errors.log")).unwrap();
/// let (host, attempts) = ("db-1", 3);
/// sink.warn(&format_args!("{host} unreachable after {attempts} attempts"))
///     .unwrap();
/// ```
pub trait Sink: fmt::Debug + Send + Sync + 'static {
    /// Log a chain of events, each caused by the next one.
    ///
    /// # Errors
    ///
    /// Return an error if `events` is empty or the record cannot be written.
    fn log(&self, events: &[&dyn Loggable]) -> Result<(), Error>;

    /// Log one event without its stack trace.
    fn log_no_stack(&self, event: &dyn Loggable) -> Result<(), Error>;

    /// Log one event as a JSON document.
    fn log_json(&self, event: &dyn Loggable) -> Result<(), Error>;

    /// Release the resources held by this sink.
    fn close(&self);

    /// Return this sink as a [`RobustSink`] if it renders no-stack and JSON events faithfully.
    ///
    /// Default to `None`.
    fn as_robust(&self) -> Option<&dyn RobustSink> {
        None
    }

    /// Log `message` as a [`Level::Critical`] event.
    fn critical(&self, message: &dyn fmt::Display) -> Result<(), Error> {
        self.log(&[&LeveledEvent::new(Level::Critical, message.to_string())])
    }

    /// Log `message` as a [`Level::Error`] event.
    fn error(&self, message: &dyn fmt::Display) -> Result<(), Error> {
        self.log(&[&LeveledEvent::new(Level::Error, message.to_string())])
    }

    /// Log `message` as a [`Level::OpsError`] event.
    fn ops_error(&self, message: &dyn fmt::Display) -> Result<(), Error> {
        self.log(&[&LeveledEvent::new(Level::OpsError, message.to_string())])
    }

    /// Log `message` as a [`Level::Warning`] event.
    fn warn(&self, message: &dyn fmt::Display) -> Result<(), Error> {
        self.log(&[&LeveledEvent::new(Level::Warning, message.to_string())])
    }

    /// Log `message` as a [`Level::Info`] event.
    fn info(&self, message: &dyn fmt::Display) -> Result<(), Error> {
        self.log(&[&LeveledEvent::new(Level::Info, message.to_string())])
    }

    /// Log `message` as a [`Level::Debug`] event.
    fn debug(&self, message: &dyn fmt::Display) -> Result<(), Error> {
        self.log(&[&LeveledEvent::new(Level::Debug, message.to_string())])
    }
}

/// A [`Sink`] that supports [`Sink::log_no_stack`] and [`Sink::log_json`] correctly.
///
/// A [`FanOut`] only forwards those two calls to children exposing this capability through
/// [`Sink::as_robust`].
pub trait RobustSink: Sink {}
