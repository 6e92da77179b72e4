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

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::num::NonZeroUsize;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::MutexGuard;

use jiff::Timestamp;
use jiff::civil::DateTime;
use jiff::tz::TimeZone;

use crate::Error;
use crate::ErrorKind;
use crate::loggable::Loggable;
use crate::sink::RobustSink;
use crate::sink::Sink;
use crate::sink::file::trigger::MessageCount;
use crate::sink::file::trigger::Trigger;
use crate::sink::file::writer::FileWriter;
use crate::sink::file::writer::create_parent_dir;
use crate::time::Clock;
use crate::time::FILENAME_FORMAT;
use crate::time::format_filename_timestamp;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

/// A builder to configure and create a [`RotatingFileSink`].
pub struct RotatingFileSinkBuilder {
    // required
    base: PathBuf,
    trigger: Box<dyn Trigger>,

    // has default
    max_files: Option<NonZeroUsize>,
    tz: TimeZone,
    clock: Clock,
    trap: Box<dyn Trap>,
}

impl fmt::Debug for RotatingFileSinkBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFileSinkBuilder")
            .field("base", &self.base)
            .field("trigger", &self.trigger)
            .field("max_files", &self.max_files)
            .field("tz", &self.tz)
            .finish_non_exhaustive()
    }
}

impl RotatingFileSinkBuilder {
    /// Create a new builder writing next to `base` and rotating when `trigger` fires.
    ///
    /// Files are named after `base` with a timestamp and a counter inserted before the
    /// extension: `logs/app.log` becomes `logs/app.2024-08-10T17-12-52.0.log`.
    pub fn new(base: impl Into<PathBuf>, trigger: impl Trigger) -> Self {
        Self {
            base: base.into(),
            trigger: Box::new(trigger),
            max_files: None,
            tz: TimeZone::UTC,
            clock: Clock::DefaultClock,
            trap: Box::new(DefaultTrap::default()),
        }
    }

    /// Set the maximum number of log files to keep, the active one included.
    ///
    /// The oldest files are deleted whenever a new file is opened. Default to keeping all files.
    pub fn max_log_files(mut self, n: NonZeroUsize) -> Self {
        self.max_files = Some(n);
        self
    }

    /// Set the time zone of file names and of the timestamps written for plain errors.
    ///
    /// Default to UTC.
    pub fn timezone(mut self, tz: TimeZone) -> Self {
        self.tz = tz;
        self
    }

    /// Set the trap for errors of housekeeping that must not fail a log call.
    ///
    /// Default to [`DefaultTrap`].
    pub fn trap(mut self, trap: impl Trap) -> Self {
        self.trap = Box::new(trap);
        self
    }

    #[cfg(test)]
    fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Build the [`RotatingFileSink`], opening its first file.
    ///
    /// # Errors
    ///
    /// Return an error if either:
    ///
    /// * The base path does not name a file.
    /// * The log directory or the first log file cannot be created.
    pub fn build(self) -> Result<RotatingFileSink, Error> {
        let Self {
            base,
            trigger,
            max_files,
            tz,
            clock,
            trap,
        } = self;

        let naming = Naming::new(&base)?;
        create_parent_dir(&base)?;
        let now = clock.now();
        let mut issued = naming.last_issued(&format_filename_timestamp(now, &tz))?;
        let (path, file) = naming.create(now, &tz, &mut issued)?;
        let writer = FileWriter::new(path, file, clock, tz);

        let sink = RotatingFileSink {
            naming,
            max_files,
            trap,
            state: Mutex::new(State {
                writer,
                trigger,
                issued,
            }),
        };
        sink.enforce_retention(&sink.current_path());
        Ok(sink)
    }
}

#[derive(Debug)]
struct State {
    writer: FileWriter,
    trigger: Box<dyn Trigger>,
    issued: Option<Issued>,
}

/// The name of the newest file this sink created.
///
/// Counters for the same date only move forward, so a file opened after retention deleted
/// `.0` does not take its name and sort as the oldest.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Issued {
    date: String,
    count: usize,
}

/// A sink that moves on to a freshly timestamped file whenever its [`Trigger`] fires.
///
/// The trigger is consulted after every successful write. Writes and the swap to a new file
/// share one lock, so no record is lost or sent to a closed file during rotation, and the record
/// that fires the trigger always lands in the old file.
///
/// # Examples
///
/// ```
/// use faultlog::loggable::Plain;
/// use faultlog::sink::Sink;
/// use faultlog::sink::file::RotatingFileSink;
///
/// let dir = tempfile::tempdir().unwrap();
/// let sink = RotatingFileSink::with_message_limit(dir.path().join("errors.log"), 1000).unwrap();
/// sink.log(&[&Plain("connection reset")]).unwrap();
/// ```
pub struct RotatingFileSink {
    naming: Naming,
    max_files: Option<NonZeroUsize>,
    trap: Box<dyn Trap>,
    state: Mutex<State>,
}

impl fmt::Debug for RotatingFileSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFileSink")
            .field("naming", &self.naming)
            .field("max_files", &self.max_files)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl RotatingFileSink {
    /// Create a sink that rotates after `messages_per_file` records.
    ///
    /// # Errors
    ///
    /// Return a validation error if `messages_per_file` is zero, in which case no file is
    /// created.
    pub fn with_message_limit(
        base: impl Into<PathBuf>,
        messages_per_file: usize,
    ) -> Result<RotatingFileSink, Error> {
        let trigger = MessageCount::new(messages_per_file)?;
        RotatingFileSinkBuilder::new(base, trigger).build()
    }

    /// Create a new [`RotatingFileSinkBuilder`].
    pub fn builder(base: impl Into<PathBuf>, trigger: impl Trigger) -> RotatingFileSinkBuilder {
        RotatingFileSinkBuilder::new(base, trigger)
    }

    /// The path of the file currently written to.
    pub fn current_path(&self) -> PathBuf {
        self.state().writer.path().to_path_buf()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_and_roll(&self, state: &mut State, written: usize) -> Result<(), Error> {
        if !state.trigger.record(written as u64) {
            return Ok(());
        }

        let result = self.roll(state);
        state.trigger.reset();
        result
    }

    fn roll(&self, state: &mut State) -> Result<(), Error> {
        let State { writer, issued, .. } = state;
        let (path, file) = self
            .naming
            .create(writer.now(), writer.timezone(), issued)
            .map_err(|err| Error::new(ErrorKind::Io, "failed to rotate log file").with_source(err))?;
        writer.replace(path, file);
        log::debug!(target: "faultlog", "rotated log file to {}", writer.path().display());

        self.enforce_retention(writer.path());
        Ok(())
    }

    fn enforce_retention(&self, active: &Path) {
        if let Some(max_files) = self.max_files {
            if let Err(err) = self.naming.delete_oldest_logs(max_files.get(), active) {
                let err = Error::new(ErrorKind::Io, "failed to delete oldest logs").with_source(err);
                self.trap.trap(&err);
            }
        }
    }
}

impl Sink for RotatingFileSink {
    fn log(&self, events: &[&dyn Loggable]) -> Result<(), Error> {
        let mut state = self.state();
        let written = state.writer.log(events)?;
        self.record_and_roll(&mut state, written)
    }

    fn log_no_stack(&self, event: &dyn Loggable) -> Result<(), Error> {
        let mut state = self.state();
        let written = state.writer.log_no_stack(event)?;
        self.record_and_roll(&mut state, written)
    }

    fn log_json(&self, event: &dyn Loggable) -> Result<(), Error> {
        let mut state = self.state();
        let written = state.writer.log_json(event)?;
        self.record_and_roll(&mut state, written)
    }

    fn close(&self) {
        self.state().writer.close();
    }

    fn as_robust(&self) -> Option<&dyn RobustSink> {
        Some(self)
    }
}

impl RobustSink for RotatingFileSink {}

#[derive(Debug)]
struct LogFile {
    filepath: PathBuf,
    datetime: DateTime,
    count: usize,
}

/// Derives rotated file names from the base path.
#[derive(Debug)]
struct Naming {
    dir: PathBuf,
    stem: String,
    extension: Option<String>,
}

impl Naming {
    fn new(base: &Path) -> Result<Self, Error> {
        let invalid = || {
            Error::new(
                ErrorKind::Validation,
                "base path must name a file with a UTF-8 name",
            )
            .with_context("base", base.display())
        };

        let stem = base
            .file_stem()
            .and_then(OsStr::to_str)
            .filter(|stem| !stem.is_empty())
            .ok_or_else(invalid)?
            .to_string();
        let extension = match base.extension() {
            None => None,
            Some(ext) => Some(ext.to_str().ok_or_else(invalid)?.to_string()),
        };
        let dir = base.parent().map(Path::to_path_buf).unwrap_or_default();

        Ok(Self {
            dir,
            stem,
            extension,
        })
    }

    fn join_date(&self, date: &str, cnt: usize) -> PathBuf {
        let stem = &self.stem;
        let filename = match &self.extension {
            Some(ext) => format!("{stem}.{date}.{cnt}.{ext}"),
            None => format!("{stem}.{date}.{cnt}"),
        };
        self.dir.join(filename)
    }

    /// Create the first unused file for `now` whose counter is above the last issued one.
    fn create(
        &self,
        now: Timestamp,
        tz: &TimeZone,
        issued: &mut Option<Issued>,
    ) -> Result<(PathBuf, File), Error> {
        let date = format_filename_timestamp(now, tz);
        let mut cnt = match issued {
            Some(last) if last.date == date => last.count + 1,
            _ => 0,
        };
        loop {
            let filepath = self.join_date(&date, cnt);
            match OpenOptions::new()
                .append(true)
                .create_new(true)
                .open(&filepath)
            {
                Ok(file) => {
                    *issued = Some(Issued { date, count: cnt });
                    return Ok((filepath, file));
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => cnt += 1,
                Err(err) => {
                    return Err(Error::new(ErrorKind::Io, "failed to create log file")
                        .with_context("path", filepath.display())
                        .with_source(err));
                }
            }
        }
    }

    fn parse(&self, filename: &str) -> Option<(DateTime, usize)> {
        let mut rest = filename.strip_prefix(self.stem.as_str())?.strip_prefix('.')?;
        if let Some(ext) = &self.extension {
            rest = rest.strip_suffix(ext.as_str())?.strip_suffix('.')?;
        }
        let (date, cnt) = rest.split_once('.')?;
        let datetime = DateTime::strptime(FILENAME_FORMAT, date).ok()?;
        let count = usize::from_str(cnt).ok()?;
        Some((datetime, count))
    }

    /// The highest counter already on disk for `date`, left behind by an earlier sink.
    fn last_issued(&self, date: &str) -> Result<Option<Issued>, Error> {
        let count = self
            .list_logfiles()?
            .into_iter()
            .filter(|file| file.datetime.strftime(FILENAME_FORMAT).to_string() == date)
            .map(|file| file.count)
            .max();
        Ok(count.map(|count| Issued {
            date: date.to_string(),
            count,
        }))
    }

    fn list_logfiles(&self) -> Result<Vec<LogFile>, Error> {
        let dir = if self.dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            self.dir.as_path()
        };
        let read_dir = fs::read_dir(dir).map_err(|err| {
            Error::new(ErrorKind::Io, "failed to read log dir")
                .with_context("dir", dir.display())
                .with_source(err)
        })?;

        let files = read_dir
            .filter_map(|entry| {
                let entry = entry.ok()?;
                // the sink only creates files, not directories or symlinks
                if !entry.metadata().ok()?.is_file() {
                    return None;
                }
                let filename = entry.file_name();
                let (datetime, count) = self.parse(filename.to_str()?)?;
                Some(LogFile {
                    filepath: entry.path(),
                    datetime,
                    count,
                })
            })
            .collect();

        Ok(files)
    }

    /// Delete the oldest files so that at most `max_files` remain, never touching `active`.
    fn delete_oldest_logs(&self, max_files: usize, active: &Path) -> Result<(), Error> {
        let mut files = self.list_logfiles()?;
        if files.len() <= max_files {
            return Ok(());
        }

        // oldest first
        files.sort_by(|a, b| (a.datetime, a.count).cmp(&(b.datetime, b.count)));
        let excess = files.len() - max_files;
        for file in files
            .iter()
            .filter(|file| file.filepath.file_name() != active.file_name())
            .take(excess)
        {
            let filepath = &file.filepath;
            fs::remove_file(filepath).map_err(|err| {
                Error::new(ErrorKind::Io, "failed to remove old log")
                    .with_context("path", filepath.display())
                    .with_source(err)
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::num::NonZeroUsize;
    use std::str::FromStr;
    use std::sync::Arc;
    use std::sync::Mutex;

    use jiff::Timestamp;
    use tempfile::TempDir;

    use super::*;
    use crate::loggable::Plain;
    use crate::sink::file::trigger::FileSize;
    use crate::time::ManualClock;

    fn start_time() -> Timestamp {
        Timestamp::from_str("2024-08-10T17:12:52Z").unwrap()
    }

    fn builder(dir: &TempDir, trigger: impl Trigger) -> RotatingFileSinkBuilder {
        RotatingFileSinkBuilder::new(dir.path().join("app.log"), trigger)
            .clock(Clock::ManualClock(ManualClock::new(start_time())))
    }

    fn filenames(dir: &TempDir) -> Vec<String> {
        let mut names = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn test_zero_messages_per_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = RotatingFileSink::with_message_limit(dir.path().join("app.log"), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(filenames(&dir).is_empty());
    }

    #[test]
    fn test_base_path_must_name_a_file() {
        let err = RotatingFileSinkBuilder::new("/", MessageCount::new(1).unwrap())
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_initial_file_is_timestamped() {
        let dir = TempDir::new().unwrap();
        let sink = builder(&dir, MessageCount::new(3).unwrap()).build().unwrap();
        assert_eq!(
            sink.current_path(),
            dir.path().join("app.2024-08-10T17-12-52.0.log")
        );
        assert_eq!(filenames(&dir), vec!["app.2024-08-10T17-12-52.0.log"]);
    }

    #[test]
    fn test_rotates_after_messages_per_file() {
        let dir = TempDir::new().unwrap();
        let sink = builder(&dir, MessageCount::new(3).unwrap()).build().unwrap();
        let first = sink.current_path();

        for i in 0..3 {
            assert_eq!(sink.current_path(), first);
            sink.log(&[&Plain(format!("message {i}"))]).unwrap();
        }
        let second = sink.current_path();
        assert_ne!(second, first);
        assert_eq!(second, dir.path().join("app.2024-08-10T17-12-52.1.log"));

        // the count restarted: three more records are needed to rotate again
        sink.log_no_stack(&Plain("message 3")).unwrap();
        sink.log_json(&Plain("message 4")).unwrap();
        assert_eq!(sink.current_path(), second);
        sink.log(&[&Plain("message 5")]).unwrap();
        assert_eq!(
            sink.current_path(),
            dir.path().join("app.2024-08-10T17-12-52.2.log")
        );

        let first_contents = fs::read_to_string(&first).unwrap();
        assert_eq!(first_contents.matches("message").count(), 3);
        assert!(first_contents.contains("message 2"));
        let second_contents = fs::read_to_string(&second).unwrap();
        assert_eq!(second_contents.matches("message").count(), 3);
    }

    #[test]
    fn test_rotated_name_follows_clock() {
        let dir = TempDir::new().unwrap();
        let sink = builder(&dir, MessageCount::new(1).unwrap()).build().unwrap();

        let later = Timestamp::from_str("2024-08-11T00:00:01Z").unwrap();
        sink.state().writer.clock_mut().set_now(later);
        sink.log(&[&Plain("boom")]).unwrap();

        assert_eq!(
            sink.current_path(),
            dir.path().join("app.2024-08-11T00-00-01.0.log")
        );
        let old = fs::read_to_string(dir.path().join("app.2024-08-10T17-12-52.0.log")).unwrap();
        assert_eq!(old, "2024-08-11 00:00:01.000 UTC - boom\n\n");
    }

    #[test]
    fn test_failed_write_does_not_count() {
        let dir = TempDir::new().unwrap();
        let sink = builder(&dir, MessageCount::new(1).unwrap()).build().unwrap();
        let first = sink.current_path();

        assert!(sink.log(&[]).is_err());
        assert_eq!(sink.current_path(), first);

        sink.close();
        assert_eq!(
            sink.log(&[&Plain("late")]).unwrap_err().kind(),
            ErrorKind::Closed
        );
        assert_eq!(sink.current_path(), first);
        assert_eq!(filenames(&dir).len(), 1);
    }

    #[test]
    fn test_rotation_via_file_size() {
        let dir = TempDir::new().unwrap();
        let sink = builder(&dir, FileSize::new(100).unwrap()).build().unwrap();

        // "2024-08-10 17:12:52.000 UTC - " is 30 bytes, plus 20 bytes of message and 2 of end
        let message = "x".repeat(20);
        sink.log(&[&Plain(message.as_str())]).unwrap();
        assert_eq!(filenames(&dir).len(), 1);
        sink.log(&[&Plain(message.as_str())]).unwrap();
        assert_eq!(filenames(&dir).len(), 2);

        let first = fs::read(dir.path().join("app.2024-08-10T17-12-52.0.log")).unwrap();
        assert_eq!(first.len(), 104);
    }

    #[test]
    fn test_max_log_files() {
        let dir = TempDir::new().unwrap();
        let sink = builder(&dir, MessageCount::new(1).unwrap())
            .max_log_files(NonZeroUsize::new(3).unwrap())
            .build()
            .unwrap();

        for i in 0..10 {
            sink.log(&[&Plain(format!("message {i}"))]).unwrap();
        }

        assert_eq!(
            filenames(&dir),
            vec![
                "app.2024-08-10T17-12-52.10.log",
                "app.2024-08-10T17-12-52.8.log",
                "app.2024-08-10T17-12-52.9.log",
            ]
        );
        assert_eq!(
            sink.current_path(),
            dir.path().join("app.2024-08-10T17-12-52.10.log")
        );
    }

    #[test]
    fn test_retention_keeps_the_newest_records() {
        let dir = TempDir::new().unwrap();
        let sink = builder(&dir, MessageCount::new(1).unwrap())
            .max_log_files(NonZeroUsize::new(3).unwrap())
            .build()
            .unwrap();

        for i in 0..10 {
            sink.log(&[&Plain(format!("message {i}"))]).unwrap();
        }

        let read = |count: usize| {
            let name = format!("app.2024-08-10T17-12-52.{count}.log");
            fs::read_to_string(dir.path().join(name)).unwrap()
        };
        assert_eq!(read(8), "2024-08-10 17:12:52.000 UTC - message 8\n\n");
        assert_eq!(read(9), "2024-08-10 17:12:52.000 UTC - message 9\n\n");
        assert_eq!(read(10), "");
    }

    #[test]
    fn test_counter_continues_after_restart() {
        let dir = TempDir::new().unwrap();
        let sink = builder(&dir, MessageCount::new(1).unwrap())
            .max_log_files(NonZeroUsize::new(2).unwrap())
            .build()
            .unwrap();
        for _ in 0..3 {
            sink.log(&[&Plain("boom")]).unwrap();
        }
        assert_eq!(
            filenames(&dir),
            vec![
                "app.2024-08-10T17-12-52.2.log",
                "app.2024-08-10T17-12-52.3.log",
            ]
        );
        drop(sink);

        let sink = builder(&dir, MessageCount::new(1).unwrap())
            .max_log_files(NonZeroUsize::new(2).unwrap())
            .build()
            .unwrap();
        assert_eq!(
            sink.current_path(),
            dir.path().join("app.2024-08-10T17-12-52.4.log")
        );
        assert_eq!(
            filenames(&dir),
            vec![
                "app.2024-08-10T17-12-52.3.log",
                "app.2024-08-10T17-12-52.4.log",
            ]
        );
    }

    #[test]
    fn test_retention_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.log"), "base").unwrap();
        fs::write(dir.path().join("app.notes.log"), "notes").unwrap();
        fs::write(dir.path().join("other.2024-08-10T17-12-52.0.log"), "other").unwrap();

        let sink = builder(&dir, MessageCount::new(1).unwrap())
            .max_log_files(NonZeroUsize::new(1).unwrap())
            .build()
            .unwrap();
        for _ in 0..3 {
            sink.log(&[&Plain("boom")]).unwrap();
        }

        assert_eq!(
            filenames(&dir),
            vec![
                "app.2024-08-10T17-12-52.3.log",
                "app.log",
                "app.notes.log",
                "other.2024-08-10T17-12-52.0.log",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_rotation_resets_trigger() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        let trapped = Arc::new(Mutex::new(vec![]));
        let sink = RotatingFileSinkBuilder::new(logs.join("app.log"), MessageCount::new(2).unwrap())
            .clock(Clock::ManualClock(ManualClock::new(start_time())))
            .trap({
                let trapped = trapped.clone();
                move |err: &Error| trapped.lock().unwrap().push(err.to_string())
            })
            .build()
            .unwrap();
        let first = sink.current_path();

        // the open handle keeps working, but no new file can be created
        fs::remove_dir_all(&logs).unwrap();

        sink.log(&[&Plain("one")]).unwrap();
        let err = sink.log(&[&Plain("two")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(sink.current_path(), first);

        // the count was reset even though rotation failed
        sink.log(&[&Plain("three")]).unwrap();
        assert!(sink.log(&[&Plain("four")]).is_err());
        assert!(trapped.lock().unwrap().is_empty());
    }

    #[test]
    fn test_parse_filenames() {
        let naming = Naming::new(Path::new("logs/app.log")).unwrap();
        assert!(naming.parse("app.2024-08-10T17-12-52.3.log").is_some());
        assert!(naming.parse("app.2024-08-10T17-12-52.3").is_none());
        assert!(naming.parse("app.log").is_none());
        assert!(naming.parse("app.yesterday.3.log").is_none());

        let naming = Naming::new(Path::new("app")).unwrap();
        let (_, count) = naming.parse("app.2024-08-10T17-12-52.12").unwrap();
        assert_eq!(count, 12);
        assert_eq!(
            naming.join_date("2024-08-10T17-12-52", 0),
            PathBuf::from("app.2024-08-10T17-12-52.0")
        );
    }
}
