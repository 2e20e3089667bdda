//! Common TsFile errors and macros.

/// Errors generated by this crate. Every kind carries a stable integer code
/// so bindings can match on it without parsing messages.
#[derive(Debug, PartialEq)]
pub enum TsFileError {
    /// An argument violates the API contract.
    InvalidArg(String),
    /// The object is not in a state that allows the operation.
    InvalidState(String),
    /// A table, timeseries or property was registered twice.
    AlreadyExists(String),
    /// A requested entry is absent from an index.
    NotExist(String),
    /// The requested device is not in the file.
    DeviceNotExist(String),
    /// The requested measurement is not in the file.
    MeasurementNotExist(String),
    /// The requested table is not in the file.
    TableNotExist(String),
    /// The requested column is not in the table schema.
    ColumnNotExist(String),
    /// A data point's runtime type mismatches the registered data type.
    InvalidDataPoint(String),
    /// An I/O error while reading.
    FileRead(String),
    /// An I/O error while writing.
    FileWrite(String),
    /// The file is known to be out of spec.
    Corrupted(String),
    /// An allocation was refused.
    Oom(String),
    /// Iterator sentinel: the stream is exhausted. Not an error to the user.
    NoMoreData,
    /// The operation or codec is not supported.
    NotSupported(String),
    /// The requested result ordering is not supported.
    UnsupportedOrder(String),
    /// Two statistics with different representations were merged.
    StatisticsClassMismatch(String),
}

impl TsFileError {
    /// The stable integer tag of this error kind.
    pub fn code(&self) -> i32 {
        match self {
            TsFileError::InvalidArg(_) => 1,
            TsFileError::InvalidState(_) => 2,
            TsFileError::AlreadyExists(_) => 3,
            TsFileError::NotExist(_) => 4,
            TsFileError::DeviceNotExist(_) => 5,
            TsFileError::MeasurementNotExist(_) => 6,
            TsFileError::TableNotExist(_) => 7,
            TsFileError::ColumnNotExist(_) => 8,
            TsFileError::InvalidDataPoint(_) => 9,
            TsFileError::FileRead(_) => 10,
            TsFileError::FileWrite(_) => 11,
            TsFileError::Corrupted(_) => 12,
            TsFileError::Oom(_) => 13,
            TsFileError::NoMoreData => 14,
            TsFileError::NotSupported(_) => 15,
            TsFileError::UnsupportedOrder(_) => 16,
            TsFileError::StatisticsClassMismatch(_) => 17,
        }
    }
}

impl std::error::Error for TsFileError {}

impl std::fmt::Display for TsFileError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TsFileError::InvalidArg(message) => write!(fmt, "invalid argument: {}", message),
            TsFileError::InvalidState(message) => write!(fmt, "invalid state: {}", message),
            TsFileError::AlreadyExists(message) => write!(fmt, "already exists: {}", message),
            TsFileError::NotExist(message) => write!(fmt, "does not exist: {}", message),
            TsFileError::DeviceNotExist(message) => write!(fmt, "device does not exist: {}", message),
            TsFileError::MeasurementNotExist(message) => {
                write!(fmt, "measurement does not exist: {}", message)
            }
            TsFileError::TableNotExist(message) => write!(fmt, "table does not exist: {}", message),
            TsFileError::ColumnNotExist(message) => write!(fmt, "column does not exist: {}", message),
            TsFileError::InvalidDataPoint(message) => write!(fmt, "invalid data point: {}", message),
            TsFileError::FileRead(message) => write!(fmt, "file read error: {}", message),
            TsFileError::FileWrite(message) => write!(fmt, "file write error: {}", message),
            TsFileError::Corrupted(message) => write!(fmt, "tsfile corrupted: {}", message),
            TsFileError::Oom(message) => write!(fmt, "out of memory: {}", message),
            TsFileError::NoMoreData => write!(fmt, "no more data"),
            TsFileError::NotSupported(message) => write!(fmt, "not supported: {}", message),
            TsFileError::UnsupportedOrder(message) => {
                write!(fmt, "unsupported order: {}", message)
            }
            TsFileError::StatisticsClassMismatch(message) => {
                write!(fmt, "statistics class mismatch: {}", message)
            }
        }
    }
}

// Read paths propagate `?` on raw I/O; write paths wrap into `FileWrite` at
// the call site.
impl From<std::io::Error> for TsFileError {
    fn from(e: std::io::Error) -> TsFileError {
        TsFileError::FileRead(format!("underlying IO error: {}", e))
    }
}

#[cfg(feature = "snappy")]
impl From<snap::Error> for TsFileError {
    fn from(e: snap::Error) -> TsFileError {
        TsFileError::Corrupted(format!("underlying snap error: {}", e))
    }
}

impl From<std::str::Utf8Error> for TsFileError {
    fn from(e: std::str::Utf8Error) -> TsFileError {
        TsFileError::Corrupted(format!("invalid utf-8 sequence: {}", e))
    }
}

/// A specialized `Result` for TsFile errors.
pub type Result<T> = std::result::Result<T, TsFileError>;

macro_rules! corrupted_err {
    ($fmt:expr) => (TsFileError::Corrupted($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => (TsFileError::Corrupted(format!($fmt, $($args),*)));
}
