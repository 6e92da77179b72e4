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

use std::any::Any;
use std::fmt;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread;

use crate::Error;
use crate::ErrorKind;
use crate::loggable::Loggable;
use crate::sink::RobustSink;
use crate::sink::Sink;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

const DEFAULT_THREAD_NAME: &str = "faultlog-fanout";

/// A builder to configure and create a [`FanOut`] sink.
pub struct FanOutBuilder {
    sinks: Vec<Arc<dyn Sink>>,
    trap: Box<dyn Trap>,
    thread_name: String,
}

impl fmt::Debug for FanOutBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOutBuilder")
            .field("sinks", &self.sinks)
            .field("thread_name", &self.thread_name)
            .finish_non_exhaustive()
    }
}

impl Default for FanOutBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FanOutBuilder {
    /// Create a new fan-out builder without any sink.
    pub fn new() -> Self {
        Self {
            sinks: vec![],
            trap: Box::new(DefaultTrap::default()),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Add a sink.
    ///
    /// # Examples
    ///
    /// ```
    /// use faultlog::sink::FanOut;
    /// use faultlog::sink::file::FileSink;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let fanout = FanOut::builder()
    ///     .sink(FileSink::new(dir.path().join("a.log")).unwrap())
    ///     .sink(FileSink::new(dir.path().join("b.log")).unwrap())
    ///     .build();
    /// assert_eq!(fanout.sinks().len(), 2);
    /// ```
    pub fn sink(mut self, sink: impl Sink) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Add a sink that is shared with other owners.
    pub fn shared(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Set the trap receiving the error of every sink that fails a call.
    ///
    /// Default to [`DefaultTrap`].
    pub fn trap(mut self, trap: impl Trap) -> Self {
        self.trap = Box::new(trap);
        self
    }

    /// Set the name of the threads dispatching to the sinks.
    ///
    /// Thread names cannot hold NUL bytes; they are removed from `thread_name`.
    pub fn thread_name(mut self, thread_name: impl Into<String>) -> Self {
        let mut thread_name = thread_name.into();
        thread_name.retain(|c| c != '\0');
        self.thread_name = thread_name;
        self
    }

    /// Build the [`FanOut`] sink.
    pub fn build(self) -> FanOut {
        let Self {
            sinks,
            trap,
            thread_name,
        } = self;
        FanOut {
            sinks,
            trap,
            thread_name,
        }
    }
}

/// A sink broadcasting every call to a fixed list of sinks concurrently.
///
/// Each log call dispatches to every applicable sink on its own thread and returns once all of
/// them are done. A sink that fails (or panics) has its error handed to the trap, once per sink
/// and call; the fan-out itself never fails a log call. `log_no_stack` and `log_json` skip sinks
/// that are not [robust](Sink::as_robust).
///
/// There is no timeout: a sink that never returns blocks the log call forever.
///
/// # Examples
///
/// ```
/// use faultlog::loggable::Plain;
/// use faultlog::sink::FanOut;
/// use faultlog::sink::Sink;
/// use faultlog::sink::file::FileSink;
///
/// let dir = tempfile::tempdir().unwrap();
/// let fanout = FanOut::builder()
///     .sink(FileSink::new(dir.path().join("primary.log")).unwrap())
///     .sink(FileSink::new(dir.path().join("replica.log")).unwrap())
///     .build();
///
/// fanout.log(&[&Plain("written to both files")]).unwrap();
/// fanout.close();
/// ```
pub struct FanOut {
    sinks: Vec<Arc<dyn Sink>>,
    trap: Box<dyn Trap>,
    thread_name: String,
}

impl fmt::Debug for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOut")
            .field("sinks", &self.sinks)
            .field("thread_name", &self.thread_name)
            .finish_non_exhaustive()
    }
}

impl FanOut {
    /// Create a fan-out over `sinks` that reports failures with [`DefaultTrap`].
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> FanOut {
        FanOut {
            sinks,
            trap: Box::new(DefaultTrap::default()),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Create a new [`FanOutBuilder`].
    pub fn builder() -> FanOutBuilder {
        FanOutBuilder::new()
    }

    /// The sinks this fan-out dispatches to, in insertion order.
    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.sinks
    }

    /// Run `op` against every target on its own thread and wait for all of them.
    fn broadcast<T, F>(&self, targets: Vec<&T>, op: F)
    where
        T: ?Sized + Sync,
        F: Fn(&T) -> Result<(), Error> + Sync,
    {
        let op = &op;
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(targets.len());
            for target in targets {
                let spawned = thread::Builder::new()
                    .name(self.thread_name.clone())
                    .spawn_scoped(scope, move || self.run(target, op));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    // deliver on the calling thread rather than skip the sink
                    Err(_) => self.run(target, op),
                }
            }

            for handle in handles {
                // run() already contains panics; a join error cannot carry one
                let _ = handle.join();
            }
        });
    }

    fn run<T, F>(&self, target: &T, op: &F)
    where
        T: ?Sized,
        F: Fn(&T) -> Result<(), Error>,
    {
        let result = panic::catch_unwind(AssertUnwindSafe(|| op(target)))
            .unwrap_or_else(|payload| Err(panicked(payload)));
        if let Err(err) = result {
            self.trap.trap(&err);
        }
    }

    fn robust_sinks(&self) -> Vec<&dyn RobustSink> {
        self.sinks
            .iter()
            .filter_map(|sink| sink.as_robust())
            .collect()
    }
}

impl Sink for FanOut {
    fn log(&self, events: &[&dyn Loggable]) -> Result<(), Error> {
        let targets: Vec<&dyn Sink> = self.sinks.iter().map(|sink| &**sink).collect();
        self.broadcast(targets, |sink| sink.log(events));
        Ok(())
    }

    fn log_no_stack(&self, event: &dyn Loggable) -> Result<(), Error> {
        self.broadcast(self.robust_sinks(), |sink| sink.log_no_stack(event));
        Ok(())
    }

    fn log_json(&self, event: &dyn Loggable) -> Result<(), Error> {
        self.broadcast(self.robust_sinks(), |sink| sink.log_json(event));
        Ok(())
    }

    fn close(&self) {
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let spawned = thread::Builder::new()
                .name(self.thread_name.clone())
                .spawn(move || sink.close());
            if let Err(err) = spawned {
                let err = Error::new(ErrorKind::Io, "failed to spawn thread closing sink")
                    .with_source(err);
                self.trap.trap(&err);
            }
        }
    }

    fn as_robust(&self) -> Option<&dyn RobustSink> {
        Some(self)
    }
}

impl RobustSink for FanOut {}

fn panicked(payload: Box<dyn Any + Send>) -> Error {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    Error::new(ErrorKind::Panicked, "sink panicked").with_context("panic", message)
}
