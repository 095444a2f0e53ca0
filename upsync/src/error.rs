use std::{error, fmt, io, string::FromUtf8Error};

use camino::FromPathBufError;

/// The error type of the synchronization engine
#[derive(Debug, Clone)]
pub enum Error {
    /// A tree violates the file/directory exclusivity or the sibling
    /// name uniqueness. Indicates a bug in tree construction.
    Structure(String),
    Utf8(String),
    Io(String),
    /// A backend call failed.
    Provider {
        op: &'static str,
        path: String,
        msg: String,
    },
    /// The cache descriptor could not be read or parsed.
    Cache(String),
    Config(String),
    /// Some uploads of a batch failed.
    Upload {
        failed: usize,
        total: usize,
        first: String,
    },
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structure(msg) => write!(f, "Invalid tree structure: {msg}"),
            Self::Utf8(msg) => write!(f, "Non UTF-8 string: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Provider { op, path, msg } if path.is_empty() => {
                write!(f, "{op} failed: {msg}")
            }
            Self::Provider { op, path, msg } => write!(f, "{op} '{path}' failed: {msg}"),
            Self::Cache(msg) => write!(f, "Cache error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Upload {
                failed,
                total,
                first,
            } => write!(f, "{failed} of {total} uploads failed, first: {first}"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

impl error::Error for Error {}

impl Error {
    /// Whether the error is a backend failure, as opposed to a local one.
    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Upload { .. })
    }
}

impl From<FromUtf8Error> for Error {
    fn from(value: FromUtf8Error) -> Self {
        Self::Utf8(String::from_utf8_lossy(&value.into_bytes()).to_string())
    }
}

impl From<FromPathBufError> for Error {
    fn from(value: FromPathBufError) -> Self {
        Self::Utf8(value.as_path().as_os_str().to_string_lossy().to_string())
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Cache(value.to_string())
    }
}

impl From<glob::PatternError> for Error {
    fn from(value: glob::PatternError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Other(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! io_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Io(format!($($t)*)));
    };
}

#[macro_export]
macro_rules! structure_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Structure(format!($($t)*)));
    };
}

#[macro_export]
macro_rules! config_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Config(format!($($t)*)));
    };
}

#[macro_export]
macro_rules! other_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Other(format!($($t)*)));
    };
}

#[macro_export]
macro_rules! io_error {
    ($($t:tt)*) => {
        $crate::Error::Io(format!($($t)*))
    };
}

#[macro_export]
macro_rules! provider_error {
    ($op:expr, $path:expr, $($t:tt)*) => {
        $crate::Error::Provider {
            op: $op,
            path: ::std::string::ToString::to_string(&$path),
            msg: format!($($t)*),
        }
    };
}

#[macro_export]
macro_rules! cache_error {
    ($($t:tt)*) => {
        $crate::Error::Cache(format!($($t)*))
    };
}

#[macro_export]
macro_rules! other_error {
    ($($t:tt)*) => {
        $crate::Error::Other(format!($($t)*))
    };
}
