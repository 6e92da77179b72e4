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

use crate::Error;
use crate::trap::Trap;

/// A trap that forwards errors to the [`log`] facade at error level.
///
/// Make sure the logger installed for the `log` crate does not write into a sink trapping into
/// this very trap, or a failing sink will keep feeding itself.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct LogTrap {}

impl Trap for LogTrap {
    fn trap(&self, err: &Error) {
        log::error!(target: "faultlog", "{err}");
    }
}
