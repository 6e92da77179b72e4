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

//! Severity levels and the leveled event the severity shortcuts of a sink log.

use std::backtrace::Backtrace;
use std::backtrace::BacktraceStatus;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use jiff::Timestamp;
use jiff::tz::TimeZone;
use serde::Serialize;

use crate::Error;
use crate::ErrorKind;
use crate::loggable::Loggable;
use crate::loggable::Render;
use crate::loggable::RenderJson;
use crate::loggable::RenderNoStack;
use crate::time::format_timestamp;

/// An enum representing the available severities of an event.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// The process cannot continue.
    Critical,
    /// A request or task failed.
    Error,
    /// An error operators must act on, typically infrastructure.
    OpsError,
    /// Something looks wrong but work continues.
    Warning,
    /// Noteworthy information.
    Info,
    /// Information for debugging.
    Debug,
}

impl Level {
    /// Return the string representation of the `Level`.
    ///
    /// This returns the same string as the `fmt::Display` implementation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Critical => "CRITICAL",
            Level::Error => "ERROR",
            Level::OpsError => "OPS_ERROR",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;
    fn from_str(s: &str) -> Result<Level, Self::Err> {
        for level in [
            Level::Critical,
            Level::Error,
            Level::OpsError,
            Level::Warning,
            Level::Info,
            Level::Debug,
        ] {
            if s.eq_ignore_ascii_case(level.as_str()) {
                return Ok(level);
            }
        }

        Err(Error::new(
            ErrorKind::Validation,
            format!("malformed level: {s:?}"),
        ))
    }
}

/// An event with a severity, a creation time and the backtrace of where it was created.
///
/// The backtrace is captured according to `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`; when capturing
/// is disabled the full rendering equals the rendering without stack.
///
/// # Examples
///
/// ```
/// use faultlog::level::Level;
/// use faultlog::level::LeveledEvent;
///
/// let event = LeveledEvent::new(Level::Warning, "disk 91% full");
/// assert_eq!(event.level(), Level::Warning);
/// assert_eq!(event.to_string(), "disk 91% full");
/// ```
#[derive(Debug)]
pub struct LeveledEvent {
    level: Level,
    message: String,
    time: Timestamp,
    tz: TimeZone,
    backtrace: Backtrace,
}

impl LeveledEvent {
    /// Create an event at `level`, timestamped now.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            time: Timestamp::now(),
            tz: TimeZone::UTC,
            backtrace: Backtrace::capture(),
        }
    }

    /// Override the creation time.
    pub fn timestamp(mut self, time: Timestamp) -> Self {
        self.time = time;
        self
    }

    /// Set the time zone the creation time is rendered in.
    ///
    /// Default to UTC.
    pub fn timezone(mut self, tz: TimeZone) -> Self {
        self.tz = tz;
        self
    }

    /// The severity.
    pub fn level(&self) -> Level {
        self.level
    }

    /// The creation time.
    pub fn time(&self) -> Timestamp {
        self.time
    }

    fn stack_trace(&self) -> Option<String> {
        match self.backtrace.status() {
            BacktraceStatus::Captured => Some(self.backtrace.to_string()),
            _ => None,
        }
    }

    fn write_header(&self, w: &mut dyn Write) -> Result<(), Error> {
        let time = format_timestamp(self.time, &self.tz);
        write!(w, "{time} - {} - {}", self.level, self.message).map_err(Error::from_io_error)
    }
}

impl fmt::Display for LeveledEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Render for LeveledEvent {
    fn render(&self, w: &mut dyn Write) -> Result<(), Error> {
        self.write_header(w)?;
        if let Some(stack) = self.stack_trace() {
            write!(w, "\n{stack}").map_err(Error::from_io_error)?;
        }
        Ok(())
    }
}

impl RenderNoStack for LeveledEvent {
    fn render_no_stack(&self, w: &mut dyn Write) -> Result<(), Error> {
        self.write_header(w)
    }
}

#[derive(Serialize)]
struct LeveledLine<'a> {
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "Level")]
    level: &'static str,
    #[serde(rename = "Message")]
    message: &'a str,
    #[serde(rename = "StackTrace", skip_serializing_if = "Option::is_none")]
    stack_trace: Option<String>,
}

impl RenderJson for LeveledEvent {
    fn render_json(&self, w: &mut dyn Write) -> Result<(), Error> {
        let line = LeveledLine {
            time: format_timestamp(self.time, &self.tz),
            level: self.level.as_str(),
            message: &self.message,
            stack_trace: self.stack_trace(),
        };
        serde_json::to_writer(w, &line).map_err(Error::from_json_error)
    }
}

impl Loggable for LeveledEvent {
    fn as_render(&self) -> Option<&dyn Render> {
        Some(self)
    }

    fn as_render_no_stack(&self) -> Option<&dyn RenderNoStack> {
        Some(self)
    }

    fn as_render_json(&self) -> Option<&dyn RenderJson> {
        Some(self)
    }
}
