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

#![allow(non_snake_case)]

use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;

pub type Result<T> = std::result::Result<T, ErrorCode>;

pub type ErrorCodeCause = Box<dyn std::error::Error + Sync + Send>;

/// The one error type that crosses crate boundaries.
///
/// An `ErrorCode` carries a stable numeric code and a human readable text.
/// The numeric code identifies the kind of error; the text describes this
/// particular occurrence.
pub struct ErrorCode {
    code: u16,
    display_text: String,
    cause: Option<ErrorCodeCause>,
}

impl ErrorCode {
    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> String {
        self.display_text.clone()
    }

    pub fn add_message(self, msg: impl AsRef<str>) -> Self {
        Self {
            code: self.code,
            display_text: format!("{}\n{}", msg.as_ref(), self.display_text),
            cause: self.cause,
        }
    }

    pub fn create(code: u16, display_text: String, cause: Option<ErrorCodeCause>) -> ErrorCode {
        ErrorCode {
            code,
            display_text,
            cause,
        }
    }

    pub fn from_std_error<T: std::error::Error>(error: T) -> Self {
        ErrorCode {
            code: ErrorCode::unknown_code(),
            display_text: error.to_string(),
            cause: None,
        }
    }

    const fn unknown_code() -> u16 {
        1000
    }
}

macro_rules! build_exceptions {
    ($($body:ident($code:expr)),*$(,)*) => {
        impl ErrorCode {
            $(
                pub fn $body(display_text: impl Into<String>) -> ErrorCode {
                    ErrorCode {
                        code: $code,
                        display_text: display_text.into(),
                        cause: None,
                    }
                }
            )*
        }
    }
}

build_exceptions! {
    Ok(0),
    UnknownException(1000),
    BadBytes(1001),
    InvalidConfig(1002),
    Timeout(1003),
    TokioError(1004),
    BadAddressFormat(1005),
    SerdeError(1006),
    UnknownKey(1007),

    // Storage and replication errors.
    MetaStoreDamaged(2001),
    MetaStoreAlreadyExists(2002),
    RaftError(2400),
    UnknownNode(2401),
    ConcurrentSnapshotInstall(2404),
    IllegalSnapshot(2405),
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Code: {}, displayText = {}.",
            self.code, self.display_text
        )
    }
}

impl Debug for ErrorCode {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Code: {}, displayText = {}.",
            self.code, self.display_text
        )?;
        if let Some(ref cause) = self.cause {
            write!(f, "\ncause: {:?}", cause)?;
        }
        std::result::Result::Ok(())
    }
}

impl std::error::Error for ErrorCode {}

impl From<std::num::ParseIntError> for ErrorCode {
    fn from(error: std::num::ParseIntError) -> Self {
        ErrorCode::from_std_error(error)
    }
}

impl From<std::str::Utf8Error> for ErrorCode {
    fn from(error: std::str::Utf8Error) -> Self {
        ErrorCode::from_std_error(error)
    }
}

impl From<std::string::FromUtf8Error> for ErrorCode {
    fn from(error: std::string::FromUtf8Error) -> Self {
        ErrorCode::from_std_error(error)
    }
}

impl From<std::net::AddrParseError> for ErrorCode {
    fn from(error: std::net::AddrParseError) -> Self {
        ErrorCode::BadAddressFormat(format!("addr parse error: {}", error))
    }
}

impl From<std::io::Error> for ErrorCode {
    fn from(error: std::io::Error) -> Self {
        ErrorCode::create(1000, format!("{}", error), Some(Box::new(error)))
    }
}

impl From<serde_json::Error> for ErrorCode {
    fn from(error: serde_json::Error) -> Self {
        ErrorCode::SerdeError(format!("json (de)serialize error: {}", error))
    }
}

impl From<anyhow::Error> for ErrorCode {
    fn from(error: anyhow::Error) -> Self {
        ErrorCode {
            code: ErrorCode::unknown_code(),
            display_text: format!("{}", error),
            cause: Some(error.into()),
        }
    }
}

/// Convert a foreign error into an `ErrorCode` of a chosen kind, attaching
/// lazily-built context.
pub trait ToErrorCode<T, E, CtxFn>
where E: Display + Send + Sync + 'static
{
    /// Wrap the error value with context.
    fn map_err_to_code<ErrFn, D>(self, err: ErrFn, context_fn: CtxFn) -> Result<T>
    where
        ErrFn: FnOnce(String) -> ErrorCode,
        D: Display,
        CtxFn: FnOnce() -> D;
}

impl<T, E, CtxFn> ToErrorCode<T, E, CtxFn> for std::result::Result<T, E>
where E: Display + Send + Sync + 'static
{
    fn map_err_to_code<ErrFn, D>(self, make_exception: ErrFn, context_fn: CtxFn) -> Result<T>
    where
        ErrFn: FnOnce(String) -> ErrorCode,
        D: Display,
        CtxFn: FnOnce() -> D,
    {
        self.map_err(|error| {
            let err_text = format!("{}, cause: {}", context_fn(), error);
            make_exception(err_text)
        })
    }
}
