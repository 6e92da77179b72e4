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

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use jiff::Timestamp;
use jiff::tz::TimeZone;
use serde::Serialize;

use crate::Error;
use crate::ErrorKind;
use crate::loggable::Loggable;
use crate::time::Clock;
use crate::time::format_timestamp;

const CAUSED_BY: &[u8] = b"\nCaused by:\n";
const RECORD_END: &[u8] = b"\n\n";
const JSON_RECORD_END: &[u8] = b"\n";

#[derive(Serialize)]
struct PlainLine {
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "Message")]
    message: String,
}

/// Renders events and writes them to the current log file.
///
/// Every record is rendered into a buffer, written with one `write_all` and synced before the
/// call returns, so a failed render leaves no partial record behind.
#[derive(Debug)]
pub(crate) struct FileWriter {
    path: PathBuf,
    file: Option<File>,
    clock: Clock,
    tz: TimeZone,
}

impl FileWriter {
    pub(crate) fn new(path: PathBuf, file: File, clock: Clock, tz: TimeZone) -> Self {
        Self {
            path,
            file: Some(file),
            clock,
            tz,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub(crate) fn timezone(&self) -> &TimeZone {
        &self.tz
    }

    #[cfg(test)]
    pub(crate) fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Return the number of bytes written.
    pub(crate) fn log(&mut self, events: &[&dyn Loggable]) -> Result<usize, Error> {
        if events.is_empty() {
            return Err(Error::new(
                ErrorKind::MissingEvent,
                "no events provided to log",
            ));
        }

        let mut buf = vec![];
        for (i, event) in events.iter().enumerate() {
            if i > 0 {
                buf.extend_from_slice(CAUSED_BY);
            }
            match event.as_render() {
                Some(render) => render.render(&mut buf)?,
                None => self.render_plain(*event, &mut buf),
            }
        }
        buf.extend_from_slice(RECORD_END);
        self.write(&buf)
    }

    pub(crate) fn log_no_stack(&mut self, event: &dyn Loggable) -> Result<usize, Error> {
        let mut buf = vec![];
        match event.as_render_no_stack() {
            Some(render) => render.render_no_stack(&mut buf)?,
            None => self.render_plain(event, &mut buf),
        }
        buf.extend_from_slice(RECORD_END);
        self.write(&buf)
    }

    pub(crate) fn log_json(&mut self, event: &dyn Loggable) -> Result<usize, Error> {
        let mut buf = vec![];
        match event.as_render_json() {
            Some(render) => render.render_json(&mut buf)?,
            None => {
                // log time stands in for the creation time plain errors don't carry
                let line = PlainLine {
                    time: format_timestamp(self.clock.now(), &self.tz),
                    message: event.to_string(),
                };
                serde_json::to_writer(&mut buf, &line).map_err(Error::from_json_error)?;
            }
        }
        buf.extend_from_slice(JSON_RECORD_END);
        self.write(&buf)
    }

    /// Swap in a freshly opened file, closing the current one.
    pub(crate) fn replace(&mut self, path: PathBuf, file: File) {
        self.path = path;
        self.file = Some(file);
    }

    pub(crate) fn close(&mut self) {
        self.file = None;
    }

    fn render_plain(&self, event: &dyn Loggable, buf: &mut Vec<u8>) {
        let now = format_timestamp(self.clock.now(), &self.tz);
        buf.extend_from_slice(format!("{now} - {event}").as_bytes());
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let path = &self.path;
        let file = self.file.as_mut().ok_or_else(|| {
            Error::new(ErrorKind::Closed, "log file is closed").with_context("path", path.display())
        })?;

        file.write_all(buf).map_err(|err| {
            Error::new(ErrorKind::Io, "failed to write log file")
                .with_context("path", path.display())
                .with_source(err)
        })?;
        file.sync_all().map_err(|err| {
            Error::new(ErrorKind::Io, "failed to sync log file")
                .with_context("path", path.display())
                .with_source(err)
        })?;

        Ok(buf.len())
    }
}

pub(crate) fn create_parent_dir(path: &Path) -> Result<(), Error> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir).map_err(|err| {
            Error::new(ErrorKind::Io, "failed to create log directory")
                .with_context("dir", dir.display())
                .with_source(err)
        }),
        _ => Ok(()),
    }
}

/// Open `path` for appending, creating it if it does not exist.
pub(crate) fn open_append(path: &Path) -> Result<File, Error> {
    create_parent_dir(path)?;
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|err| {
            Error::new(ErrorKind::Io, "failed to open log file")
                .with_context("path", path.display())
                .with_source(err)
        })
}
