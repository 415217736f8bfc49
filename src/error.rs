//! Library error types.

use std::fmt;
use std::io;

/// A fudge-msg Result, normally returning a fudge-msg [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A fudge-msg error. Covers everything that can go wrong while encoding or
/// decoding a stream, converting field values, or mapping objects to and from
/// messages.
#[derive(Debug)]
pub enum Error {
    /// The byte stream violates the encoding: a bad prefix byte, a length
    /// inconsistent with the declared envelope size, an unknown fixed-width
    /// type id, or an oversized field name.
    MalformedStream(String),
    /// The byte source ended mid-envelope, mid-field, or mid-name.
    TruncatedStream {
        /// What was being read when the source ran dry.
        step: &'static str,
    },
    /// An ordinal outside the signed 16-bit range was supplied.
    InvalidOrdinal(i64),
    /// The type dictionary has no way to produce the requested host type from
    /// the given field.
    ConversionUnavailable {
        /// The wire type of the offending field.
        wire_type: &'static str,
        /// The requested host type.
        target: &'static str,
    },
    /// Object mapping was requested for a type with no registered builder and
    /// no applicable default builder.
    NoBuilder {
        /// The host type that had no builder.
        target: String,
    },
    /// The serializer's handle stack found the object currently being encoded
    /// already on the stack.
    CyclicReference,
    /// A numeric value appeared in an ordinal-0 class hint. Back/forward
    /// references are reserved and not interpreted.
    UnsupportedFeature(&'static str),
    /// A wire-type association, secondary type, builder, or class rename was
    /// already registered with a conflicting definition.
    AlreadyRegistered(String),
    /// The underlying byte sink or source failed.
    IoFailure(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::MalformedStream(ref msg) => write!(f, "Malformed stream: {}", msg),
            Error::TruncatedStream { step } => {
                write!(f, "Stream ended early while reading {}", step)
            }
            Error::InvalidOrdinal(ord) => {
                write!(f, "Ordinal {} outside signed 16-bit range", ord)
            }
            Error::ConversionUnavailable { wire_type, target } => write!(
                f,
                "Cannot convert field of wire type {} to host type {}",
                wire_type, target
            ),
            Error::NoBuilder { ref target } => {
                write!(f, "No builder registered or derivable for {}", target)
            }
            Error::CyclicReference => {
                write!(f, "Object graph contains a cycle; serialization aborted")
            }
            Error::UnsupportedFeature(what) => write!(f, "Unsupported feature: {}", what),
            Error::AlreadyRegistered(ref what) => {
                write!(f, "Conflicting registration: {}", what)
            }
            Error::IoFailure(_) => write!(f, "Byte source/sink failure"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::IoFailure(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        // An EOF from the transport means the stream itself is short, which
        // is a format-level condition, not a transport failure.
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::TruncatedStream { step: "byte source" }
        } else {
            Error::IoFailure(e)
        }
    }
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedStream(msg.into())
    }

    pub(crate) fn truncated(step: &'static str) -> Self {
        Error::TruncatedStream { step }
    }
}
