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

use std::io;
use std::io::Write;

use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::Error;
use crate::time::format_timestamp;
use crate::trap::Trap;

/// The trap used when none is configured.
///
/// Every error becomes one line on standard error, `<timestamp> faultlog: <error>`, with the
/// timestamp in UTC. Failures to write to standard error are ignored.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct DefaultTrap {}

impl DefaultTrap {
    fn line(&self, now: Timestamp, err: &Error) -> String {
        format!("{} faultlog: {err}", format_timestamp(now, &TimeZone::UTC))
    }
}

impl Trap for DefaultTrap {
    fn trap(&self, err: &Error) {
        let line = self.line(Timestamp::now(), err);
        let _ = writeln!(io::stderr().lock(), "{line}");
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_line_is_prefixed() {
        let now = Timestamp::from_str("2024-08-10T17:12:52Z").unwrap();
        let err = Error::new(ErrorKind::Closed, "log file is closed");
        assert_eq!(
            DefaultTrap::default().line(now, &err),
            "2024-08-10 17:12:52.000 UTC faultlog: log file is closed (Closed)"
        );
    }
}
