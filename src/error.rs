//! # Error Types
//!
//! This module defines all error types for the fretwise engine.
//!
//! Errors carry the offending input or a short description so the caller can
//! surface them without further context.
//!
//! ## Error Types
//! - `Parse` - malformed chord symbol, note name, key or Roman numeral
//! - `AudioUnavailable` - the audio backend could not be initialised
//! - `Store` - the persistent store rejected a read or write
//! - `ImportFormat` - an import file could not be read as the expected records
//! - `Catalogue` - a voicing catalogue document could not be deserialised
//! - `Config` - an engine configuration document is invalid
//!
//! Catalogue *validation* findings are not errors; see
//! [`crate::voicing::CatalogueIssue`].
//!
//! ## Usage
//! ```rust
//! use fretwise::{parse_chord, FretwiseError};
//!
//! match parse_chord("Cadd11") {
//!     Ok(chord) => println!("{}", chord),
//!     Err(FretwiseError::Parse { input, message }) => {
//!         eprintln!("cannot read '{}': {}", input, message);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FretwiseError {
    /// Malformed textual input.
    ///
    /// # Example
    /// ```
    /// # use fretwise::FretwiseError;
    /// let err = FretwiseError::Parse {
    ///     input: "H7".to_string(),
    ///     message: "unknown root letter 'H'".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Parse error in 'H7': unknown root letter 'H'");
    /// ```
    #[error("Parse error in '{input}': {message}")]
    Parse { input: String, message: String },

    /// The audio backend failed to initialise; playback sessions abort.
    #[error("Audio unavailable: {0}")]
    AudioUnavailable(String),

    /// The persistent store failed. In-memory state stays authoritative.
    #[error("Store error: {0}")]
    Store(String),

    /// An import file was not a JSON array of the expected records.
    ///
    /// # Example
    /// ```
    /// # use fretwise::FretwiseError;
    /// let err = FretwiseError::ImportFormat("expected an array".to_string());
    /// assert_eq!(err.to_string(), "Import format error: expected an array");
    /// ```
    #[error("Import format error: {0}")]
    ImportFormat(String),

    /// A voicing catalogue document could not be read.
    #[error("Invalid catalogue: {0}")]
    Catalogue(String),

    /// An engine configuration document is invalid.
    #[error("Invalid config: {0}")]
    Config(String),
}

impl FretwiseError {
    pub(crate) fn parse(input: &str, message: impl Into<String>) -> Self {
        FretwiseError::Parse {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FretwiseError>;
