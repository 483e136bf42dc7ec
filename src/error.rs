use std::fmt;
use std::io;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a line could not be turned into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    MissingDelimiter,
    EmptyKey,
    InvalidValue,
    OutOfRange,
    InvalidUtf8,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reason::MissingDelimiter => "missing `;` delimiter",
            Reason::EmptyKey => "empty key",
            Reason::InvalidValue => "value is not a decimal number",
            Reason::OutOfRange => "value out of range",
            Reason::InvalidUtf8 => "line is not valid UTF-8",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {record:?}")]
pub struct MalformedRecordError {
    reason: Reason,
    record: String,
}

impl MalformedRecordError {
    pub fn new(reason: Reason, record: impl Into<String>) -> Self {
        Self {
            reason,
            record: record.into(),
        }
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    /// The offending line, lossily decoded if it was not UTF-8.
    pub fn record(&self) -> &str {
        &self.record
    }
}

/// An aggregate was requested over zero values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("aggregate over an empty group")]
pub struct EmptyGroupError;

/// Where in the input a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Location {
    /// 1-based line number in a line stream.
    Line(u64),
    /// Byte offset of the start of the line in a byte slice.
    Offset(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Line(n) => write!(f, "line {n}"),
            Location::Offset(n) => write!(f, "byte offset {n}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed record at {location}")]
    MalformedRecord {
        location: Location,
        #[source]
        source: MalformedRecordError,
    },
    #[error("failed to read input")]
    Io(#[from] io::Error),
    #[error("failed to build worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to spawn worker thread")]
    Spawn(#[source] io::Error),
    #[error("worker thread panicked")]
    WorkerPanicked,
}

impl Error {
    pub(crate) fn malformed(location: Location, source: MalformedRecordError) -> Self {
        Error::MalformedRecord { location, source }
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            Error::MalformedRecord { location, .. } => Some(*location),
            _ => None,
        }
    }

    /// Keeps whichever of `current` and `candidate` points earliest in the
    /// input; errors without a location sort last.
    pub(crate) fn keep_earliest(current: &mut Option<Error>, candidate: Error) {
        let replace = match current {
            None => true,
            Some(existing) => match (existing.location(), candidate.location()) {
                (Some(a), Some(b)) => b < a,
                (None, Some(_)) => true,
                _ => false,
            },
        };
        if replace {
            *current = Some(candidate);
        }
    }
}
