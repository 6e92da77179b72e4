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

//! The capabilities an event offers to the sinks rendering it.
//!
//! Every event is a [`Loggable`]: something with a message (its [`Display`] output). On top of
//! that an event may expose up to three rendering capabilities. Sinks ask for the capability a
//! call needs and fall back to the plain `<timestamp> - <message>` form when it is missing.
//!
//! ```
//! use std::io::Write;
//!
//! use faultlog::Error;
//! use faultlog::loggable::Loggable;
//! use faultlog::loggable::Render;
//!
//! #[derive(Debug)]
//! struct QuotaExceeded {
//!     tenant: String,
//! }
//!
//! impl std::fmt::Display for QuotaExceeded {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "quota exceeded for {}", self.tenant)
//!     }
//! }
//!
//! impl Render for QuotaExceeded {
//!     fn render(&self, w: &mut dyn Write) -> Result<(), Error> {
//!         write!(w, "QUOTA tenant={}", self.tenant).map_err(Error::from_io_error)
//!     }
//! }
//!
//! impl Loggable for QuotaExceeded {
//!     fn as_render(&self) -> Option<&dyn Render> {
//!         Some(self)
//!     }
//! }
//! ```
//!
//! [`Display`]: std::fmt::Display

use std::fmt;
use std::io::Write;

use crate::Error;

/// A value that can be handed to a sink.
///
/// The [`Display`](fmt::Display) output is the message used by the plain rendering. All
/// capability accessors default to `None`, which makes the value a plain error.
pub trait Loggable: fmt::Display + fmt::Debug + Send + Sync {
    /// The full rendering, stack trace included.
    fn as_render(&self) -> Option<&dyn Render> {
        None
    }

    /// The rendering without stack trace.
    fn as_render_no_stack(&self) -> Option<&dyn RenderNoStack> {
        None
    }

    /// The structured JSON rendering.
    fn as_render_json(&self) -> Option<&dyn RenderJson> {
        None
    }
}

/// Render the full representation of an event.
pub trait Render {
    /// Write the full representation into `w`.
    fn render(&self, w: &mut dyn Write) -> Result<(), Error>;
}

/// Render an event without its stack trace.
pub trait RenderNoStack: Render {
    /// Write the representation without stack trace into `w`.
    fn render_no_stack(&self, w: &mut dyn Write) -> Result<(), Error>;
}

/// Render an event as a single JSON document.
pub trait RenderJson {
    /// Write one JSON document into `w`, without a trailing newline.
    fn render_json(&self, w: &mut dyn Write) -> Result<(), Error>;
}

/// Wrap any displayable value, typically a [`std::error::Error`], as a plain event.
///
/// # Examples
///
/// ```
/// use faultlog::loggable::Loggable;
/// use faultlog::loggable::Plain;
///
/// let err = std::io::Error::other("boom");
/// let event = Plain(err);
/// assert!(event.as_render().is_none());
/// assert_eq!(event.to_string(), "boom");
/// ```
#[derive(Debug, Clone)]
pub struct Plain<E>(pub E);

impl<E: fmt::Display> fmt::Display for Plain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<E> Loggable for Plain<E> where E: fmt::Display + fmt::Debug + Send + Sync {}

impl Loggable for anyhow::Error {}

impl Loggable for Error {}
