//! Permanently apply an OpenType substitution feature to a font.
//!
//! Stylistic sets like `ss01` map default glyphs to alternates. Freezing a
//! feature copies each alternate's outline and advance width over its base
//! glyph, so the alternate design shows up without the feature enabled.
//!
//! # Usage
//! ```no_run
//! # fn test() -> feature_freezer::Result<()> {
//! use feature_freezer::{FeatureFreezer, Font};
//!
//! let mut font = Font::open("Input-Regular.ttf")?;
//! let report = FeatureFreezer::default().freeze(&mut font);
//! println!("froze {} glyph(s)", report.frozen_count());
//! font.save("Output-Regular.ttf")?;
//! # Ok(())
//! # }
//! ```
//!
//! Fonts with TrueType (`glyf`) or name-keyed CFF outlines are supported,
//! and only single substitutions are frozen; other lookup types under the
//! feature are left as they are.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]

mod cff;
mod error;
mod freeze;
mod gsub;
mod model;
mod sfnt;

pub use error::{Error, Result};
pub use freeze::{
    parse_feature_tag, FeatureFreezer, FreezeReport, FrozenLookup, Replacement, SkipReason,
    SkippedPair, DEFAULT_FEATURE,
};
pub use model::{
    CopyError, CopyOutcome, FeatureTriple, Font, Glyph, Lookup, LookupKind, Metrics, Outline,
    PosSub, PosSubQuery, Subtable,
};
pub use write_fonts::types::Tag;

#[cfg(feature = "bin")]
mod cli;

#[cfg(feature = "bin")]
pub use cli::{run, write_report, Args, ReportFormat};
