// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

use thiserror::Error;

#[derive(Error, Debug)]
/// Defines all possible errors that can occur in the bridge.
///
/// Each variant displays as `"Type: message"` so the Kotlin layer can
/// classify a thrown exception by its prefix.
pub enum Error {
    /// The native engine reported an error string.
    #[error("Api: {0}")]
    Api(String),

    /// A required native pointer or handle was null.
    #[error("NilPointer: {0}")]
    NilPointer(String),

    /// Bytes received from native code were not valid UTF-8.
    #[error("Utf8: {0}")]
    Utf8(String),

    /// A native call failed with no retrievable message.
    #[error("NegativeStatus: {0}")]
    NegativeStatus(i64),

    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),

    /// A transfer length does not fit in a JNI array.
    #[error("BufferTooLarge: requested {requested} bytes, limit is {limit}")]
    BufferTooLarge { requested: usize, limit: usize },

    #[error("SignatureTooLarge: signature is {len} bytes, capacity is {capacity}")]
    SignatureTooLarge { len: usize, capacity: usize },

    #[error("NoSignature: sign callback returned no signature")]
    NoSignature,

    #[error("InactiveSigner: signer context has been released")]
    InactiveSigner,

    /// The calling thread could not be attached to the managed runtime.
    #[error("NoEnvironment: {0}")]
    NoEnvironment(String),

    /// The managed callback threw.
    #[error("Callback: {0}")]
    Callback(String),

    #[error("Jni: {0}")]
    Jni(String),

    #[error("Io: {0}")]
    Io(String),

    /// The native engine library could not be loaded.
    #[error("Engine: {0}")]
    Engine(String),

    #[error("Config: {0}")]
    Config(String),

    #[error("NotInitialized: native bridge is not loaded")]
    NotInitialized,

    /// A transfer buffer could not be allocated.
    #[error("OutOfMemory: {0}")]
    OutOfMemory(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type
    pub fn code(&self) -> i32 {
        match self {
            Self::Api(_) => 100,
            Self::NilPointer(_) => 101,
            Self::Utf8(_) => 102,
            Self::NegativeStatus(_) => 103,
            Self::InvalidArgument(_) => 104,
            Self::BufferTooLarge { .. } => 105,
            Self::SignatureTooLarge { .. } => 106,
            Self::NoSignature => 107,
            Self::InactiveSigner => 108,
            Self::NoEnvironment(_) => 109,
            Self::Callback(_) => 110,
            Self::Jni(_) => 111,
            Self::Io(_) => 112,
            Self::Engine(_) => 113,
            Self::Config(_) => 114,
            Self::NotInitialized => 115,
            Self::OutOfMemory(_) => 116,
        }
    }

    /// Returns the JNI class name of the Java exception thrown for this error.
    pub fn java_exception_class(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) | Self::BufferTooLarge { .. } | Self::NilPointer(_) => {
                "java/lang/IllegalArgumentException"
            }
            Self::InactiveSigner | Self::NotInitialized => "java/lang/IllegalStateException",
            _ => "java/lang/RuntimeException",
        }
    }

    /// Converts a type and message to an Error.
    ///
    /// This is the inverse of the `Display` form, so `"Api: bad manifest"`
    /// becomes `Error::Api("bad manifest")`. Types without a string payload
    /// and unknown types are converted to `Error::Api` with the full text.
    pub fn from_type_and_message<S: Into<String>>(error_type: &str, error_message: S) -> Self {
        let error_message = error_message.into();
        match error_type {
            "Api" => Self::Api(error_message),
            "NilPointer" => Self::NilPointer(error_message),
            "Utf8" => Self::Utf8(error_message),
            "NegativeStatus" => match error_message.trim().parse() {
                Ok(code) => Self::NegativeStatus(code),
                Err(_) => Self::Api(format!("{error_type}: {error_message}")),
            },
            "InvalidArgument" => Self::InvalidArgument(error_message),
            "NoEnvironment" => Self::NoEnvironment(error_message),
            "Callback" => Self::Callback(error_message),
            "Jni" => Self::Jni(error_message),
            "Io" => Self::Io(error_message),
            "Engine" => Self::Engine(error_message),
            "Config" => Self::Config(error_message),
            "OutOfMemory" => Self::OutOfMemory(error_message),
            _ => Self::Api(format!("{error_type}: {error_message}")),
        }
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        // Split only on the first ": " so messages may contain ": "
        match err.split_once(": ") {
            Some((error_type, message)) => Self::from_type_and_message(error_type, message),
            None => Self::Api(err.to_string()),
        }
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::from(err.as_str())
    }
}

impl From<jni::errors::Error> for Error {
    fn from(err: jni::errors::Error) -> Self {
        Self::Jni(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<std::ffi::NulError> for Error {
    fn from(err: std::ffi::NulError) -> Self {
        Self::InvalidArgument(format!("string contains an interior NUL byte: {err}"))
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::Utf8(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<libloading::Error> for Error {
    fn from(err: libloading::Error) -> Self {
        Self::Engine(err.to_string())
    }
}
