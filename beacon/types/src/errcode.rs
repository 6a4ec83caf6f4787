// Copyright 2021 Beacon Labs.
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

use serde::Deserialize;
use serde::Serialize;

/// The error discriminant every response carries over the wire.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrCode {
    Success,
    NotLeader,
    InternalError,
    InputParamError,
    ParseFromPbFail,
    ParseToPbFail,
    ConfigExists,
    ConfigNotExists,
    ConfigNotExistsVersion,
    RetryLater,
    ExecFail,
    PeerNotEqual,
    HaveNotInit,
}

impl ErrCode {
    pub fn is_success(&self) -> bool {
        matches!(self, ErrCode::Success)
    }
}

impl Default for ErrCode {
    fn default() -> Self {
        ErrCode::Success
    }
}

impl std::fmt::Display for ErrCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
