//! Error type shared by font loading, freezing and saving.

use std::path::PathBuf;

use thiserror::Error;
use write_fonts::read::ReadError;

/// Result type alias using this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while opening, freezing or saving a font.
#[derive(Debug, Error)]
pub enum Error {
    /// The input font could not be read from disk.
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The output font (or report) could not be written.
    #[error("failed to write '{}': {source}", path.display())]
    Write {
        /// Path that was being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The font data is not a well-formed OpenType font.
    #[error("malformed font data: {0}")]
    Malformed(#[from] ReadError),

    /// A table needed to freeze glyphs is absent.
    #[error("font has no '{0}' table")]
    MissingTable(&'static str),

    /// The font stores its outlines in a way this tool cannot rewrite.
    #[error("unsupported outline format: {0}")]
    UnsupportedOutlines(&'static str),

    /// A `loca` entry points outside the `glyf` table.
    #[error("glyph {0} has an out of bounds outline record")]
    MalformedGlyph(u16),

    /// The output extension does not name a supported container format.
    #[error("cannot infer a font format from '{}' (supported: ttf, otf)", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The output path resolves to the input file.
    #[error("refusing to overwrite the input font '{}'", .0.display())]
    OutputIsInput(PathBuf),

    /// A feature tag is not 1 to 4 printable ASCII characters.
    #[error("invalid feature tag '{0}': expected 1 to 4 printable ASCII characters")]
    InvalidTag(String),

    /// The freeze report could not be serialized.
    #[error("failed to serialize report: {0}")]
    Report(String),
}
