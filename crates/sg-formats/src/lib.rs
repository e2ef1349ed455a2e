//! Bank documents and audio metadata for segue.
//!
//! Loads TOML music bank descriptions into `sg-ir` and probes WAV headers
//! for sample rate and length.

mod bank_doc;
mod wav_probe;

pub use bank_doc::{load_bank, load_bank_file, LoadedBank};
pub use wav_probe::{probe_wav, WavInfo};

use thiserror::Error;

/// Error type for bank and audio metadata parsing.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Invalid file header or magic bytes
    #[error("invalid file header")]
    InvalidHeader,
    /// Unexpected end of file
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// Unsupported format version or encoding
    #[error("unsupported format")]
    UnsupportedVersion,
    /// Malformed bank document
    #[error("bank document: {0}")]
    Toml(#[from] toml::de::Error),
    /// A rule, stinger, sequence or switch names a segment that is not defined
    #[error("unknown segment `{0}`")]
    UnknownSegment(String),
    /// A value is out of range or inconsistent
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// I/O error
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
