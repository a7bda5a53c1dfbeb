use std::num::TryFromIntError;

use snafu::{Backtrace, Snafu};

use crate::types::KeyId;

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

/// The role a key is selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum KeyRole {
    #[display("encryption")]
    Encryption,
    #[display("decryption")]
    Decryption,
}

/// Classification of every failure this crate reports.
///
/// Each [`Error`] maps to exactly one kind via [`Error::kind`]. Callers that only need a
/// pass/fail status flatten on this, tests assert on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorKind {
    KeyRingCorrupt,
    KeyNotFound,
    BadPassphrase,
    KeyUnusable,
    SourceUnreadable,
    SinkUnwritable,
    UnexpectedFormat,
    ProtocolViolation,
    InvalidConfiguration,
}

/// Error types
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("key ring is corrupt: {source}"))]
    KeyRingCorrupt {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },
    #[snafu(display("no {role} key found in the key ring"))]
    KeyNotFound { role: KeyRole },
    #[snafu(display("passphrase does not unlock secret key {key_id}"))]
    BadPassphrase { key_id: KeyId },
    #[snafu(display("key is not usable: {message}"))]
    KeyUnusable { message: String },
    #[snafu(display("source is not readable: {source}"))]
    SourceUnreadable { source: std::io::Error },
    #[snafu(display("sink is not writable: {source}"))]
    SinkUnwritable { source: std::io::Error },
    #[snafu(display("unexpected format: {message}"))]
    UnexpectedFormat { message: String },
    #[snafu(display("signature context misuse: {message}"))]
    ProtocolViolation { message: String },
    #[snafu(display("invalid configuration: {message}"))]
    InvalidConfiguration { message: String },

    #[snafu(display("invalid input"))]
    InvalidInput,
    #[snafu(display("invalid armor wrappers"))]
    InvalidArmorWrappers,
    #[snafu(display("invalid checksum"))]
    InvalidChecksum,
    #[snafu(transparent)]
    Base64Decode { source: base64::DecodeError },
    #[snafu(display("needed {needed} bytes, {remaining} remaining"))]
    TooShort { needed: usize, remaining: usize },
    #[snafu(transparent)]
    RSAError { source: rsa::errors::Error },
    #[snafu(transparent)]
    IO {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("cfb: invalid key iv length"))]
    CfbInvalidKeyIvLength,
    #[snafu(display("Modification Detection Code error"))]
    MdcError,
    /// Signals packet versions and parameters we don't support.
    #[snafu(display("Unsupported: {message}"))]
    Unsupported { message: String },
    #[snafu(display("{message}"))]
    Message { message: String },
    #[snafu(transparent)]
    TryFromInt { source: TryFromIntError },
}

impl Error {
    /// Classifies this error.
    ///
    /// Low level failures that escaped a component boundary without being wrapped
    /// are treated as format errors, apart from I/O errors that did not originate
    /// from parsing.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyRingCorrupt { .. } => ErrorKind::KeyRingCorrupt,
            Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Self::BadPassphrase { .. } => ErrorKind::BadPassphrase,
            Self::KeyUnusable { .. } | Self::RSAError { .. } => ErrorKind::KeyUnusable,
            Self::SourceUnreadable { .. } => ErrorKind::SourceUnreadable,
            Self::SinkUnwritable { .. } => ErrorKind::SinkUnwritable,
            Self::ProtocolViolation { .. } => ErrorKind::ProtocolViolation,
            Self::InvalidConfiguration { .. } => ErrorKind::InvalidConfiguration,
            Self::IO { source, .. } if !is_format_io_error(source) => ErrorKind::SourceUnreadable,
            _ => ErrorKind::UnexpectedFormat,
        }
    }

    /// Wraps a crate error so it can travel through `std::io` interfaces.
    pub(crate) fn into_io(self) -> std::io::Error {
        match self {
            Self::IO { source, .. } => source,
            err => std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        }
    }

    /// Recovers an error that was produced while reading a message.
    ///
    /// Crate errors wrapped by [`Error::into_io`] are unwrapped, malformed data becomes
    /// `UnexpectedFormat`, anything else is a failure of the underlying source.
    pub(crate) fn from_read(err: std::io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(err) = inner.downcast::<Error>() {
                    return *err;
                }
            }
            return Error::UnexpectedFormat {
                message: "lost error context".into(),
            };
        }
        if is_format_io_error(&err) {
            Error::UnexpectedFormat {
                message: err.to_string(),
            }
        } else {
            Error::SourceUnreadable { source: err }
        }
    }
}

fn is_format_io_error(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::InvalidData
            | std::io::ErrorKind::InvalidInput
            | std::io::ErrorKind::UnexpectedEof
    )
}

impl From<cipher::InvalidLength> for Error {
    fn from(_: cipher::InvalidLength) -> Error {
        Error::CfbInvalidKeyIvLength
    }
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::Message { message: err }
    }
}

macro_rules! unsupported_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unsupported { message: $e.to_string()})
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unsupported { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::Error::Message { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Message { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            $crate::errors::bail!($e);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            $crate::errors::bail!($fmt, $($arg)+);
        }
    };
}

macro_rules! ensure_eq {
    ($left:expr, $right:expr) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::errors::bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`"#, left_val, right_val)
                }
            }
        }
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::errors::bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`: {}"#, left_val, right_val,
                           format_args!($($arg)+))
                }
            }
        }
    });
}

pub(crate) use bail;
pub(crate) use ensure;
pub(crate) use ensure_eq;
pub(crate) use unsupported_err;
