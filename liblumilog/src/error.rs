use std::path::PathBuf;
use thiserror::Error;

use super::timestamp::TimestampFormat;
use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Row at line {line} has {fields} field(s); expected exactly 2")]
    MalformedRow { line: u64, fields: usize },
    #[error("CsvIngester failed to tokenize input: {0}")]
    Csv(#[from] csv::Error),
    #[error("CsvIngester failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Error)]
pub enum TimestampError {
    #[error("Could not parse timestamp {text:?}; expected format {format}")]
    Parse {
        text: String,
        format: TimestampFormat,
    },
    #[error("Timestamp {0} seconds is outside of the representable date range")]
    OutOfRange(f64),
    #[error("Could not format timestamp: {0}")]
    Format(String),
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Input {0:?} does not exist")]
    Missing(PathBuf),
    #[error("Input {0:?} is a zero-byte file")]
    Empty(PathBuf),
    #[error("Input {path:?} is below the minimum size ({size} < {min} bytes)")]
    TooSmall { path: PathBuf, size: u64, min: u64 },
    #[error("Input {path:?} does not have the required .{expected} extension")]
    WrongExtension { path: PathBuf, expected: String },
    #[error("Input directory {0:?} does not contain any matching files")]
    NoMatchingFiles(PathBuf),
    #[error("InputSelector failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

impl InputError {
    /// The input was rejected by the file-selection policy
    pub fn is_exclusion(&self) -> bool {
        matches!(
            self,
            Self::Missing(_)
                | Self::Empty(_)
                | Self::TooSmall { .. }
                | Self::WrongExtension { .. }
                | Self::NoMatchingFiles(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel {channel} input was excluded: {source}")]
    Input {
        channel: String,
        #[source]
        source: InputError,
    },
    #[error("Channel {channel} failed to ingest: {source}")]
    Ingest {
        channel: String,
        #[source]
        source: IngestError,
    },
    #[error("Channel {channel} has a bad timestamp on line {line}: {source}")]
    Timestamp {
        channel: String,
        line: u64,
        #[source]
        source: TimestampError,
    },
    #[error("Channel {channel} has an unparseable value {text:?} on line {line}")]
    BadValue {
        channel: String,
        line: u64,
        text: String,
    },
    #[error("Channel {channel} is not time ordered: sample {index} at {timestamp} s precedes {previous} s")]
    OutOfOrder {
        channel: String,
        index: usize,
        timestamp: f64,
        previous: f64,
    },
}

impl ChannelError {
    /// The name of the channel which failed
    pub fn channel(&self) -> &str {
        match self {
            Self::Input { channel, .. }
            | Self::Ingest { channel, .. }
            | Self::Timestamp { channel, .. }
            | Self::BadValue { channel, .. }
            | Self::OutOfOrder { channel, .. } => channel,
        }
    }

    /// Input exclusions are reported but do not stop a run. An IO failure while
    /// selecting the input is not an exclusion.
    pub fn is_input_exclusion(&self) -> bool {
        match self {
            Self::Input { source, .. } => source.is_exclusion(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config is missing required key: {0}")]
    MissingKey(String),
    #[error("Config has an invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("Config has an invalid date: {0}")]
    BadDate(#[from] TimestampError),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("SeriesWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("SeriesWriter failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("SeriesWriter failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("SeriesWriter was given a second series named {0}")]
    DuplicateSeries(String),
    #[cfg(feature = "hdf5")]
    #[error("SeriesWriter failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[cfg(feature = "hdf5")]
    #[error("SeriesWriter failed to convert a string for HDF5: {0}")]
    HDF5StringError(#[from] hdf5::types::StringError),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Channel error: {0}")]
    ChannelError(#[from] ChannelError),
    #[error("Processor failed due to SeriesWriter error: {0}")]
    WriterError(#[from] WriterError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed because a loader worker panicked")]
    WorkerPanicked,
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
