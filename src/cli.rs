use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use write_fonts::types::Tag;

use crate::error::{Error, Result};
use crate::freeze::{parse_feature_tag, FeatureFreezer, FreezeReport};
use crate::model::Font;

/// Permanently apply an OpenType stylistic set (or any other single
/// substitution feature) to a font's default glyphs.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the font whose feature should be frozen
    pub input: PathBuf,
    /// Path to where the modified font should be written (.ttf or .otf)
    pub output: PathBuf,
    /// OpenType feature tag to freeze
    #[arg(default_value = "ss01", value_parser = parse_feature_tag)]
    pub feature: Tag,
    /// Path to where a report of the replacements should be written (.json or .ron)
    #[arg(short, long)]
    pub report: Option<PathBuf>,
}

/// Serialization formats for the freeze report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Pretty-printed JSON.
    Json,
    /// Pretty-printed RON.
    Ron,
}

impl ReportFormat {
    /// Deduces the format from `path`'s extension.
    ///
    /// # Errors
    ///
    /// Fails for anything but `json` and `ron`.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(OsStr::to_str) {
            Some("json") => Ok(ReportFormat::Json),
            Some("ron") => Ok(ReportFormat::Ron),
            _ => Err(Error::Report(format!(
                "cannot deduce report format from '{}' (supported: json, ron)",
                path.display()
            ))),
        }
    }
}

/// Freezes the requested feature of `args.input` into `args.output`,
/// printing progress to stdout.
///
/// # Errors
///
/// Fails if the input cannot be opened, the output or report cannot be
/// written, or the output would overwrite the input.
pub fn run(args: &Args) -> Result<FreezeReport> {
    crate::sfnt::check_output_format(&args.output)?;
    let report_format = args.report.as_deref().map(ReportFormat::from_path).transpose()?;
    ensure_distinct(&args.input, &args.output)?;

    println!("Opening font: {}", args.input.display());
    let mut font = Font::open(&args.input)?;

    let freezer = FeatureFreezer::new(args.feature);
    let report = freezer.freeze(&mut font);
    let feature = &report.feature;
    println!("Freezing feature '{feature}'...");

    for lookup in &report.lookups {
        println!("  Found lookup '{}' for feature '{feature}'", lookup.name);
        for replacement in &lookup.replacements {
            println!(
                "    Permanently replacing '{}' with '{}'",
                replacement.base, replacement.alternate
            );
        }
    }

    match report.frozen_count() {
        0 => println!("Warning: No substitutions found for feature '{feature}'"),
        count => println!("Successfully froze {count} substitution(s)"),
    }

    println!("Saving font to: {}", args.output.display());
    font.save(&args.output)?;

    if let (Some(path), Some(format)) = (&args.report, report_format) {
        write_report(&report, path, format)?;
        println!("Report written to: {}", path.display());
    }

    println!("Done!");
    Ok(report)
}

/// Serializes `report` to `path`.
///
/// # Errors
///
/// Fails if serialization or writing fails.
pub fn write_report(report: &FreezeReport, path: &Path, format: ReportFormat) -> Result<()> {
    let serialized = match format {
        ReportFormat::Json => {
            serde_json::to_string_pretty(report).map_err(|err| Error::Report(err.to_string()))?
        }
        ReportFormat::Ron => ron::ser::to_string_pretty(report, ron::ser::PrettyConfig::default())
            .map_err(|err| Error::Report(err.to_string()))?,
    };
    fs::write(path, serialized).map_err(|source| Error::Write { path: path.to_owned(), source })
}

/// Rejects an output path that resolves to the input file.
fn ensure_distinct(input: &Path, output: &Path) -> Result<()> {
    let Ok(output) = output.canonicalize() else {
        return Ok(());
    };
    match input.canonicalize() {
        Ok(input) if input == output => Err(Error::OutputIsInput(output)),
        _ => Ok(()),
    }
}
