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

//! Traps handle errors that cannot be returned to the caller of a log call.
//!
//! A [`FanOut`](crate::sink::FanOut) hands every failing child's error to its trap; a
//! [`RotatingFileSink`](crate::sink::file::RotatingFileSink) traps failures of housekeeping that
//! runs after the record was already written.
//!
//! Any `Fn(&Error) + Send + Sync + 'static` closure is a trap:
//!
//! ```
//! use faultlog::Error;
//! use faultlog::sink::FanOut;
//!
//! let fanout = FanOut::builder()
//!     .trap(|err: &Error| eprintln!("sink failed: {err}"))
//!     .build();
//! ```

use crate::Error;

mod default;
mod log;

pub use self::default::DefaultTrap;
pub use self::log::LogTrap;

/// A handler for errors that cannot be propagated to the caller.
///
/// A trap is called from whichever thread observed the failure and must not block for long.
pub trait Trap: Send + Sync + 'static {
    /// Handle one error.
    fn trap(&self, err: &Error);
}

impl<F> Trap for F
where
    F: Fn(&Error) + Send + Sync + 'static,
{
    fn trap(&self, err: &Error) {
        self(err)
    }
}
