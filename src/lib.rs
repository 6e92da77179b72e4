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

//! Faultlog records error events durably, to one file, to rotating files, or to several sinks at
//! once.
//!
//! # Overview
//!
//! Events are [`Loggable`] values: anything with a message, optionally able to render itself in
//! full (with stack trace), without stack trace, or as JSON. A [`Sink`] writes events somewhere.
//! This crate provides:
//!
//! * [`FileSink`](sink::file::FileSink), appending to one file and syncing every record;
//! * [`RotatingFileSink`](sink::file::RotatingFileSink), moving on to a fresh timestamped file
//!   whenever its [`Trigger`](sink::file::trigger::Trigger) fires;
//! * [`FanOut`](sink::FanOut), dispatching every call to several sinks concurrently and reporting
//!   failing sinks to a [`Trap`] instead of failing the caller.
//!
//! # Examples
//!
//! ```
//! use faultlog::loggable::Plain;
//! use faultlog::sink::FanOut;
//! use faultlog::sink::Sink;
//! use faultlog::sink::file::FileSink;
//! use faultlog::sink::file::RotatingFileSink;
//! use faultlog::trap::LogTrap;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let fanout = FanOut::builder()
//!     .sink(FileSink::new(dir.path().join("errors.log")).unwrap())
//!     .sink(RotatingFileSink::with_message_limit(dir.path().join("archive.log"), 10_000).unwrap())
//!     .trap(LogTrap::default())
//!     .build();
//!
//! let err = std::io::Error::other("connection reset by peer");
//! fanout.log(&[&Plain(err)]).unwrap();
//! fanout.warn(&"retrying in 5s").unwrap();
//! fanout.log_json(&Plain("upstream unavailable")).unwrap();
//! fanout.close();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod level;
pub mod loggable;
pub mod sink;
pub mod time;
pub mod trap;

mod error;
pub use self::error::Error;
pub use self::error::ErrorKind;

pub use self::loggable::Loggable;
pub use self::sink::RobustSink;
pub use self::sink::Sink;
pub use self::trap::Trap;
