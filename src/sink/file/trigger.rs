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

use std::fmt;
use std::num::NonZeroU64;
use std::num::NonZeroUsize;

use crate::Error;
use crate::ErrorKind;

/// Decides when a [`RotatingFileSink`](super::RotatingFileSink) moves on to a new file.
///
/// The sink calls [`record`](Trigger::record) after every successful write and rotates when it
/// returns `true`. [`reset`](Trigger::reset) is called on every rotation attempt, whether opening
/// the new file succeeded or not.
pub trait Trigger: fmt::Debug + Send + 'static {
    /// Record one successful write of `written` bytes and return whether to rotate.
    fn record(&mut self, written: u64) -> bool;

    /// Forget everything recorded for the current file.
    fn reset(&mut self);
}

/// Rotate after a fixed number of records.
///
/// # Examples
///
/// ```
/// use faultlog::sink::file::trigger::MessageCount;
///
/// assert!(MessageCount::new(0).is_err());
/// let trigger = MessageCount::new(1000).unwrap();
/// assert_eq!(trigger.messages_per_file(), 1000);
/// ```
#[derive(Debug, Clone)]
pub struct MessageCount {
    messages_per_file: NonZeroUsize,
    count: usize,
}

impl MessageCount {
    /// Create a trigger rotating every `messages_per_file` records.
    ///
    /// # Errors
    ///
    /// Return a validation error if `messages_per_file` is zero.
    pub fn new(messages_per_file: usize) -> Result<Self, Error> {
        let messages_per_file = NonZeroUsize::new(messages_per_file).ok_or_else(|| {
            Error::new(
                ErrorKind::Validation,
                "log files must have room for at least 1 message",
            )
        })?;
        Ok(Self {
            messages_per_file,
            count: 0,
        })
    }

    /// The configured threshold.
    pub fn messages_per_file(&self) -> usize {
        self.messages_per_file.get()
    }

    /// Records counted since the last rotation.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl Trigger for MessageCount {
    fn record(&mut self, _: u64) -> bool {
        self.count += 1;
        self.count >= self.messages_per_file.get()
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

/// Rotate once the current file has received a number of bytes.
///
/// The record crossing the limit is still written to the current file.
#[derive(Debug, Clone)]
pub struct FileSize {
    max_bytes: NonZeroU64,
    written: u64,
}

impl FileSize {
    /// Create a trigger rotating once `max_bytes` have been written to a file.
    ///
    /// # Errors
    ///
    /// Return a validation error if `max_bytes` is zero.
    pub fn new(max_bytes: u64) -> Result<Self, Error> {
        let max_bytes = NonZeroU64::new(max_bytes).ok_or_else(|| {
            Error::new(
                ErrorKind::Validation,
                "log files must have room for at least 1 byte",
            )
        })?;
        Ok(Self {
            max_bytes,
            written: 0,
        })
    }

    /// Bytes written since the last rotation.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Trigger for FileSize {
    fn record(&mut self, written: u64) -> bool {
        self.written = self.written.saturating_add(written);
        self.written >= self.max_bytes.get()
    }

    fn reset(&mut self) {
        self.written = 0;
    }
}
