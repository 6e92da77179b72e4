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

//! Sinks writing to a single file or to rotating files.
//!
//! # Example
//!
//!```
//! use faultlog::loggable::Plain;
//! use faultlog::sink::Sink;
//! use faultlog::sink::file::RotatingFileSink;
//! use faultlog::sink::file::trigger::MessageCount;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let sink = RotatingFileSink::builder(dir.path().join("app.log"), MessageCount::new(500).unwrap())
//!     .build()
//!     .unwrap();
//!
//! sink.log_json(&Plain("this record is written to app.<timestamp>.0.log")).unwrap();
//! ```

pub use self::rolling::RotatingFileSink;
pub use self::rolling::RotatingFileSinkBuilder;
pub use self::single::FileSink;
pub use self::single::FileSinkBuilder;

mod rolling;
mod single;
pub mod trigger;
mod writer;
