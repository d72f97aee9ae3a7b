use std::path::PathBuf;
use std::{fmt, io};

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export operations.
///
/// This type wraps the more specific error kinds so that the pipeline can
/// report a single failure cause to its caller.
#[derive(Debug)]
pub enum ExportError {
    /// The directory session or result cursor failed.
    Directory(DirectoryError),

    /// The export destination could not be opened, written or closed.
    Sink(SinkError),

    /// A record could not be encoded.
    Codec(CodecError),

    /// A search filter could not be parsed.
    Filter(FilterError),

    /// Configuration errors.
    Config(ConfigError),

    /// A directory snapshot file could not be loaded.
    Snapshot(String),

    /// I/O errors outside of the export sink.
    Io(io::Error),
}

/// Result codes reported by a directory server (RFC 4511).
///
/// Only the codes the export path needs to tell apart are named; everything
/// else is carried as [`StatusCode::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusCode {
    Success,
    OperationsError,
    ProtocolError,
    TimeLimitExceeded,
    SizeLimitExceeded,
    AdminLimitExceeded,
    NoSuchObject,
    InvalidDnSyntax,
    Busy,
    Unavailable,
    UnwillingToPerform,
    Other,
    Unknown(u32),
}

/// Failure raised by a directory session or a result cursor.
///
/// The optional status code is what the export pipeline uses to tell a
/// server-side truncation apart from a real failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryError {
    status: Option<StatusCode>,
    message: String,
    matched_dn: Option<String>,
}

/// Export destination errors.
#[derive(Debug)]
pub enum SinkError {
    /// The destination could not be created.
    Open { path: PathBuf, source: io::Error },

    /// Writing a record failed.
    Write(io::Error),

    /// Flushing or closing the destination failed.
    Close(io::Error),

    /// A write was attempted before `open` or after `close`.
    NotOpen,
}

/// Record encoding errors.
///
/// These indicate a broken record life cycle rather than bad data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A line was added to a record after its separator was appended.
    RecordFinished,

    /// An unfinished record was handed to the encoder.
    RecordNotFinished,
}

/// Search filter parse errors. Positions are byte offsets into the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The filter string is empty.
    Empty,

    /// The filter ended while more input was expected.
    UnexpectedEnd,

    /// An unexpected character was found.
    UnexpectedChar { position: usize, found: char },

    /// A `\XX` escape is not two hexadecimal digits.
    InvalidEscape(usize),

    /// An item has no attribute description.
    MissingAttribute(usize),

    /// Input remains after a complete filter.
    TrailingInput(usize),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= StatusCode ========================= */

impl StatusCode {
    /// Map a numeric LDAP result code.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => StatusCode::Success,
            1 => StatusCode::OperationsError,
            2 => StatusCode::ProtocolError,
            3 => StatusCode::TimeLimitExceeded,
            4 => StatusCode::SizeLimitExceeded,
            11 => StatusCode::AdminLimitExceeded,
            32 => StatusCode::NoSuchObject,
            34 => StatusCode::InvalidDnSyntax,
            51 => StatusCode::Busy,
            52 => StatusCode::Unavailable,
            53 => StatusCode::UnwillingToPerform,
            80 => StatusCode::Other,
            n => StatusCode::Unknown(n),
        }
    }

    /// Numeric LDAP result code.
    pub fn code(&self) -> u32 {
        match self {
            StatusCode::Success => 0,
            StatusCode::OperationsError => 1,
            StatusCode::ProtocolError => 2,
            StatusCode::TimeLimitExceeded => 3,
            StatusCode::SizeLimitExceeded => 4,
            StatusCode::AdminLimitExceeded => 11,
            StatusCode::NoSuchObject => 32,
            StatusCode::InvalidDnSyntax => 34,
            StatusCode::Busy => 51,
            StatusCode::Unavailable => 52,
            StatusCode::UnwillingToPerform => 53,
            StatusCode::Other => 80,
            StatusCode::Unknown(n) => *n,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            StatusCode::Success => "success",
            StatusCode::OperationsError => "operationsError",
            StatusCode::ProtocolError => "protocolError",
            StatusCode::TimeLimitExceeded => "timeLimitExceeded",
            StatusCode::SizeLimitExceeded => "sizeLimitExceeded",
            StatusCode::AdminLimitExceeded => "adminLimitExceeded",
            StatusCode::NoSuchObject => "noSuchObject",
            StatusCode::InvalidDnSyntax => "invalidDNSyntax",
            StatusCode::Busy => "busy",
            StatusCode::Unavailable => "unavailable",
            StatusCode::UnwillingToPerform => "unwillingToPerform",
            StatusCode::Other => "other",
            StatusCode::Unknown(_) => "unknown",
        }
    }
}

/* ========================= DirectoryError ========================= */

impl DirectoryError {
    /// Create an error carrying a server status code.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            matched_dn: None,
        }
    }

    /// Create an error that did not come with a status code, such as a
    /// broken connection or a misused cursor.
    pub fn without_status(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            matched_dn: None,
        }
    }

    /// Attach the matched DN reported by the server.
    pub fn with_matched_dn(mut self, dn: impl Into<String>) -> Self {
        self.matched_dn = Some(dn.into());
        self
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn matched_dn(&self) -> Option<&str> {
        self.matched_dn.as_deref()
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Directory(e) => write!(f, "Directory error: {e}"),
            ExportError::Sink(e) => write!(f, "Export sink error: {e}"),
            ExportError::Codec(e) => write!(f, "LDIF encoding error: {e}"),
            ExportError::Filter(e) => write!(f, "Invalid filter: {e}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Snapshot(msg) => write!(f, "Snapshot error: {msg}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "[LDAP: error code {status}] {}", self.message)?,
            None => write!(f, "{}", self.message)?,
        }
        if let Some(dn) = &self.matched_dn {
            write!(f, " (matched DN: {dn})")?;
        }
        Ok(())
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Open { path, source } => {
                write!(f, "Failed to create {}: {source}", path.display())
            }
            SinkError::Write(e) => write!(f, "Failed to write record: {e}"),
            SinkError::Close(e) => write!(f, "Failed to close output: {e}"),
            SinkError::NotOpen => write!(f, "Output is not open"),
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::RecordFinished => write!(f, "Record is already finished"),
            CodecError::RecordNotFinished => write!(f, "Record has no separator line"),
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Empty => write!(f, "empty filter"),
            FilterError::UnexpectedEnd => write!(f, "unexpected end of filter"),
            FilterError::UnexpectedChar { position, found } => {
                write!(f, "unexpected '{found}' at position {position}")
            }
            FilterError::InvalidEscape(pos) => write!(f, "invalid escape at position {pos}"),
            FilterError::MissingAttribute(pos) => {
                write!(f, "missing attribute description at position {pos}")
            }
            FilterError::TrailingInput(pos) => {
                write!(f, "unexpected input after filter at position {pos}")
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Directory(e) => Some(e),
            ExportError::Sink(e) => Some(e),
            ExportError::Codec(e) => Some(e),
            ExportError::Filter(e) => Some(e),
            ExportError::Config(e) => Some(e),
            ExportError::Io(e) => Some(e),
            ExportError::Snapshot(_) => None,
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Open { source, .. } => Some(source),
            SinkError::Write(e) | SinkError::Close(e) => Some(e),
            SinkError::NotOpen => None,
        }
    }
}

impl std::error::Error for DirectoryError {}
impl std::error::Error for CodecError {}
impl std::error::Error for FilterError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<DirectoryError> for ExportError {
    fn from(err: DirectoryError) -> Self {
        ExportError::Directory(err)
    }
}

impl From<SinkError> for ExportError {
    fn from(err: SinkError) -> Self {
        ExportError::Sink(err)
    }
}

impl From<CodecError> for ExportError {
    fn from(err: CodecError) -> Self {
        ExportError::Codec(err)
    }
}

impl From<FilterError> for ExportError {
    fn from(err: FilterError) -> Self {
        ExportError::Filter(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<toml::de::Error> for ExportError {
    fn from(err: toml::de::Error) -> Self {
        ExportError::Config(ConfigError::InvalidFormat(err.to_string()))
    }
}

impl From<toml::ser::Error> for ExportError {
    fn from(err: toml::ser::Error) -> Self {
        ExportError::Config(ConfigError::InvalidFormat(err.to_string()))
    }
}
