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

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use jiff::tz::TimeZone;

use crate::Error;
use crate::loggable::Loggable;
use crate::sink::RobustSink;
use crate::sink::Sink;
use crate::sink::file::writer::FileWriter;
use crate::sink::file::writer::open_append;
use crate::time::Clock;

/// A builder to configure and create a [`FileSink`].
#[derive(Debug)]
pub struct FileSinkBuilder {
    path: PathBuf,
    tz: TimeZone,
    clock: Clock,
}

impl FileSinkBuilder {
    /// Create a new file sink builder.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tz: TimeZone::UTC,
            clock: Clock::DefaultClock,
        }
    }

    /// Set the time zone of the timestamps the sink writes for plain errors.
    ///
    /// Default to UTC.
    ///
    /// # Examples
    ///
    /// ```
    /// use faultlog::sink::file::FileSinkBuilder;
    /// use jiff::tz::TimeZone;
    ///
    /// let builder = FileSinkBuilder::new("errors.log").timezone(TimeZone::system());
    /// ```
    pub fn timezone(mut self, tz: TimeZone) -> Self {
        self.tz = tz;
        self
    }

    #[cfg(test)]
    pub(crate) fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Build the [`FileSink`].
    ///
    /// # Errors
    ///
    /// Return an error if the log directory or the log file cannot be created.
    pub fn build(self) -> Result<FileSink, Error> {
        let FileSinkBuilder { path, tz, clock } = self;
        let file = open_append(&path)?;
        let writer = FileWriter::new(path, file, clock, tz);
        Ok(FileSink {
            writer: Mutex::new(writer),
        })
    }
}

/// A sink that appends events to a single file.
///
/// The file is opened once, appended to and synced after every record. Records never
/// interleave: rendering, writing and syncing happen under one lock.
///
/// # Examples
///
/// ```
/// use faultlog::loggable::Plain;
/// use faultlog::sink::Sink;
/// use faultlog::sink::file::FileSink;
///
/// let dir = tempfile::tempdir().unwrap();
/// let sink = FileSink::new(dir.path().join("errors.log")).unwrap();
/// sink.log(&[&Plain("connection reset")]).unwrap();
/// sink.close();
/// ```
#[derive(Debug)]
pub struct FileSink {
    writer: Mutex<FileWriter>,
}

impl FileSink {
    /// Open `path` for appending, creating it and its directory if needed.
    pub fn new(path: impl Into<PathBuf>) -> Result<FileSink, Error> {
        FileSinkBuilder::new(path).build()
    }

    /// Create a new [`FileSinkBuilder`].
    pub fn builder(path: impl Into<PathBuf>) -> FileSinkBuilder {
        FileSinkBuilder::new(path)
    }

    /// The path of the file this sink writes to.
    pub fn path(&self) -> PathBuf {
        self.writer().path().to_path_buf()
    }

    fn writer(&self) -> MutexGuard<'_, FileWriter> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Sink for FileSink {
    fn log(&self, events: &[&dyn Loggable]) -> Result<(), Error> {
        self.writer().log(events).map(|_| ())
    }

    fn log_no_stack(&self, event: &dyn Loggable) -> Result<(), Error> {
        self.writer().log_no_stack(event).map(|_| ())
    }

    fn log_json(&self, event: &dyn Loggable) -> Result<(), Error> {
        self.writer().log_json(event).map(|_| ())
    }

    fn close(&self) {
        self.writer().close();
    }

    fn as_robust(&self) -> Option<&dyn RobustSink> {
        Some(self)
    }
}

impl RobustSink for FileSink {}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::str::FromStr;
    use std::sync::Arc;
    use std::thread;

    use insta::assert_snapshot;
    use jiff::Timestamp;
    use rand::Rng;
    use rand::distr::Alphanumeric;
    use tempfile::TempDir;

    use super::*;
    use crate::ErrorKind;
    use crate::level::Level;
    use crate::level::LeveledEvent;
    use crate::loggable::Plain;
    use crate::loggable::Render;
    use crate::loggable::RenderJson;
    use crate::loggable::RenderNoStack;
    use crate::time::ManualClock;

    fn manual_sink(dir: &TempDir) -> FileSink {
        let now = Timestamp::from_str("2024-08-10T17:12:52Z").unwrap();
        FileSinkBuilder::new(dir.path().join("test.log"))
            .clock(Clock::ManualClock(ManualClock::new(now)))
            .build()
            .unwrap()
    }

    fn contents(sink: &FileSink) -> String {
        fs::read_to_string(sink.path()).unwrap()
    }

    #[derive(Debug)]
    struct Rich;

    impl std::fmt::Display for Rich {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("rich")
        }
    }

    impl Render for Rich {
        fn render(&self, w: &mut dyn Write) -> Result<(), Error> {
            w.write_all(b"rich with stack\n  at main").map_err(Error::from_io_error)
        }
    }

    impl RenderNoStack for Rich {
        fn render_no_stack(&self, w: &mut dyn Write) -> Result<(), Error> {
            w.write_all(b"rich without stack").map_err(Error::from_io_error)
        }
    }

    impl RenderJson for Rich {
        fn render_json(&self, w: &mut dyn Write) -> Result<(), Error> {
            w.write_all(br#"{"rich":true}"#).map_err(Error::from_io_error)
        }
    }

    impl Loggable for Rich {
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

    #[derive(Debug)]
    struct Broken;

    impl std::fmt::Display for Broken {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("broken")
        }
    }

    impl Render for Broken {
        fn render(&self, _: &mut dyn Write) -> Result<(), Error> {
            Err(Error::new(ErrorKind::Serialization, "cannot render"))
        }
    }

    impl Loggable for Broken {
        fn as_render(&self) -> Option<&dyn Render> {
            Some(self)
        }
    }

    #[test]
    fn test_plain_error() {
        let dir = TempDir::new().unwrap();
        let sink = manual_sink(&dir);
        sink.log(&[&Plain("boom")]).unwrap();
        assert_eq!(contents(&sink), "2024-08-10 17:12:52.000 UTC - boom\n\n");
    }

    #[test]
    fn test_plain_error_as_json() {
        let dir = TempDir::new().unwrap();
        let sink = manual_sink(&dir);
        sink.log_json(&Plain("boom")).unwrap();
        assert_snapshot!(
            contents(&sink).trim_end(),
            @r#"{"Time":"2024-08-10 17:12:52.000 UTC","Message":"boom"}"#
        );
        assert!(contents(&sink).ends_with("}\n"));
    }

    #[test]
    fn test_plain_error_no_stack() {
        let dir = TempDir::new().unwrap();
        let sink = manual_sink(&dir);
        sink.log_no_stack(&Plain("boom")).unwrap();
        assert_eq!(contents(&sink), "2024-08-10 17:12:52.000 UTC - boom\n\n");
    }

    #[test]
    fn test_capabilities_are_used() {
        let dir = TempDir::new().unwrap();
        let sink = manual_sink(&dir);
        sink.log(&[&Rich]).unwrap();
        sink.log_no_stack(&Rich).unwrap();
        sink.log_json(&Rich).unwrap();
        assert_eq!(
            contents(&sink),
            "rich with stack\n  at main\n\nrich without stack\n\n{\"rich\":true}\n"
        );
    }

    #[test]
    fn test_caused_by_chain() {
        let dir = TempDir::new().unwrap();
        let sink = manual_sink(&dir);
        sink.log(&[&Rich, &Plain("root cause")]).unwrap();
        assert_eq!(
            contents(&sink),
            "rich with stack\n  at main\nCaused by:\n2024-08-10 17:12:52.000 UTC - root cause\n\n"
        );
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let sink = manual_sink(&dir);
        let err = sink.log(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingEvent);
        assert_eq!(contents(&sink), "");
    }

    #[test]
    fn test_failed_render_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let sink = manual_sink(&dir);
        let err = sink.log(&[&Plain("first"), &Broken]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
        assert_eq!(contents(&sink), "");
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.log");
        fs::write(&path, "previous run\n").unwrap();

        let sink = FileSink::new(&path).unwrap();
        sink.log(&[&Plain("boom")]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("previous run\n"));
        assert!(text.ends_with(" - boom\n\n"));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("test.log");
        let sink = FileSink::new(&path).unwrap();
        sink.info(&"started").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = TempDir::new().unwrap();
        let sink = manual_sink(&dir);
        sink.close();
        sink.close();
        let err = sink.log(&[&Plain("late")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
    }

    #[test]
    fn test_severity_shortcuts() {
        let dir = TempDir::new().unwrap();
        let sink = manual_sink(&dir);
        sink.critical(&"a").unwrap();
        sink.error(&"b").unwrap();
        sink.ops_error(&"c").unwrap();
        sink.warn(&"d").unwrap();
        sink.info(&"e").unwrap();
        sink.debug(&"f").unwrap();

        let text = contents(&sink);
        for (level, message) in [
            (Level::Critical, "a"),
            (Level::Error, "b"),
            (Level::OpsError, "c"),
            (Level::Warning, "d"),
            (Level::Info, "e"),
            (Level::Debug, "f"),
        ] {
            assert!(text.contains(&format!(" - {level} - {message}")), "{text}");
        }
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_severity_shortcut_with_several_values() {
        let dir = TempDir::new().unwrap();
        let sink = manual_sink(&dir);
        let (host, attempts) = ("db-1", 3);
        sink.warn(&format_args!("{host} unreachable after {attempts} attempts"))
            .unwrap();
        assert!(
            contents(&sink).contains(" - WARNING - db-1 unreachable after 3 attempts"),
            "{}",
            contents(&sink)
        );
    }

    #[test]
    fn test_leveled_event_json() {
        let dir = TempDir::new().unwrap();
        let sink = manual_sink(&dir);
        let time = Timestamp::from_str("2024-01-01T00:00:00Z").unwrap();
        sink.log_json(&LeveledEvent::new(Level::Warning, "slow").timestamp(time))
            .unwrap();

        let text = contents(&sink);
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["Time"], "2024-01-01 00:00:00.000 UTC");
        assert_eq!(value["Level"], "WARNING");
        assert_eq!(value["Message"], "slow");
    }

    #[test]
    fn test_concurrent_records_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(FileSink::new(dir.path().join("test.log")).unwrap());

        let messages = (0..8)
            .map(|_| generate_random_string())
            .collect::<Vec<_>>();
        thread::scope(|scope| {
            for message in &messages {
                let sink = sink.clone();
                scope.spawn(move || {
                    for _ in 0..25 {
                        sink.log(&[&Plain(message.as_str())]).unwrap();
                    }
                });
            }
        });

        let text = fs::read_to_string(sink.path()).unwrap();
        let records = text.split_terminator("\n\n").collect::<Vec<_>>();
        assert_eq!(records.len(), 8 * 25);
        for record in records {
            let (_, message) = record.split_once(" - ").unwrap();
            assert!(messages.iter().any(|m| m == message), "{record}");
        }
    }

    fn generate_random_string() -> String {
        let mut rng = rand::rng();
        let len = rng.random_range(50..=100);
        let random_string: String = std::iter::repeat(())
            .map(|()| rng.sample(Alphanumeric))
            .map(char::from)
            .take(len)
            .collect();

        random_string
    }
}
