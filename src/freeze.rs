//! Making a feature's single substitutions the font's default glyphs.

use log::{debug, warn};
use serde::Serialize;
use write_fonts::types::Tag;

use crate::error::{Error, Result};
use crate::model::{CopyError, CopyOutcome, Font, PosSub, PosSubQuery, Subtable};

/// Feature frozen when none is named.
pub const DEFAULT_FEATURE: Tag = Tag::new(b"ss01");

/// Parses a feature tag of 1 to 4 printable ASCII characters, padding it
/// with spaces.
///
/// # Errors
///
/// Fails on empty, overlong or non-printable tags.
pub fn parse_feature_tag(tag: &str) -> Result<Tag> {
    let bytes = tag.as_bytes();
    let printable = bytes.iter().all(|byte| (0x20..=0x7E).contains(byte));
    if bytes.is_empty() || bytes.len() > 4 || !printable {
        return Err(Error::InvalidTag(tag.to_owned()));
    }

    let mut raw = [b' '; 4];
    raw[..bytes.len()].copy_from_slice(bytes);
    Ok(Tag::new(&raw))
}

/// A base glyph that now carries its alternate's outline and width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replacement {
    /// Glyph that was overwritten.
    pub base: String,
    /// Glyph whose outline and width were copied.
    pub alternate: String,
}

/// Why a substitution pair did not lead to a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The alternate (or base) glyph is not in the font.
    MissingGlyph,
    /// The base glyph already matches the alternate.
    AlreadyFrozen,
    /// The alternate is a composite built on the base glyph.
    ComponentCycle,
}

/// A substitution pair that was left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPair {
    /// Glyph the substitution applies to.
    pub base: String,
    /// Glyph the substitution produces.
    pub alternate: String,
    /// Why nothing was copied.
    pub reason: SkipReason,
}

/// A lookup registered under the frozen feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrozenLookup {
    /// The lookup's name.
    pub name: String,
    /// Replacements made from the lookup's subtables, in order.
    pub replacements: Vec<Replacement>,
}

/// What freezing a feature did to a font.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreezeReport {
    /// The frozen feature tag, without padding.
    pub feature: String,
    /// Every lookup registered under the feature.
    pub lookups: Vec<FrozenLookup>,
    /// Substitution pairs that did not lead to a replacement.
    pub skipped: Vec<SkippedPair>,
}

impl FreezeReport {
    fn new(feature: Tag) -> Self {
        Self {
            feature: feature.to_string().trim_end().to_owned(),
            lookups: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Number of base glyphs that were overwritten.
    #[must_use]
    pub fn frozen_count(&self) -> usize {
        self.lookups.iter().map(|lookup| lookup.replacements.len()).sum()
    }

    /// Every replacement across all lookups.
    pub fn replacements(&self) -> impl Iterator<Item = &Replacement> {
        self.lookups.iter().flat_map(|lookup| &lookup.replacements)
    }
}

/// Freezes one feature of a font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFreezer {
    feature: Tag,
}

impl Default for FeatureFreezer {
    fn default() -> Self {
        Self::new(DEFAULT_FEATURE)
    }
}

impl FeatureFreezer {
    /// Creates a freezer for `feature`.
    #[must_use]
    pub fn new(feature: Tag) -> Self {
        Self { feature }
    }

    /// The feature this freezer applies.
    #[must_use]
    pub fn feature(&self) -> Tag {
        self.feature
    }

    /// Overwrites every glyph that a lookup registered under the feature
    /// substitutes with its substitute's outline and width.
    ///
    /// Only single substitutions are applied. Pairs are collected one
    /// subtable at a time and applied before the next subtable is read.
    pub fn freeze(&self, font: &mut Font) -> FreezeReport {
        let mut report = FreezeReport::new(self.feature);

        for lookup_index in 0..font.lookups().len() {
            let lookup = &font.lookups()[lookup_index];
            if !lookup.implements(self.feature) {
                continue;
            }

            let mut frozen = FrozenLookup {
                name: lookup.name().to_owned(),
                replacements: Vec::new(),
            };
            debug!("freezing '{}' ({})", lookup.name(), lookup.kind());

            for subtable_index in 0..lookup.subtables().len() {
                let subtable = &font.lookups()[lookup_index].subtables()[subtable_index];
                let pairs = collect_pairs(font, subtable, &mut report.skipped);

                for (base, alternate) in pairs {
                    let reason = match font.copy_glyph(&alternate, &base) {
                        Ok(CopyOutcome::Replaced) => {
                            frozen.replacements.push(Replacement { base, alternate });
                            continue;
                        }
                        Ok(CopyOutcome::Unchanged) => SkipReason::AlreadyFrozen,
                        Err(CopyError::UnknownGlyph(_)) => SkipReason::MissingGlyph,
                        Err(err @ CopyError::ComponentCycle { .. }) => {
                            warn!("not replacing '{base}': {err}");
                            SkipReason::ComponentCycle
                        }
                    };
                    report.skipped.push(SkippedPair { base, alternate, reason });
                }
            }

            report.lookups.push(frozen);
        }

        report
    }
}

/// Queries `subtable` for every glyph of the font and returns the
/// (base, alternate) pairs of its single substitutions whose alternate
/// exists.
fn collect_pairs(
    font: &Font,
    subtable: &Subtable,
    skipped: &mut Vec<SkippedPair>,
) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for glyph in font.glyphs() {
        let entries = match subtable.query(glyph.name()) {
            PosSubQuery::Found(entries) => entries,
            PosSubQuery::NotFound => continue,
            PosSubQuery::Malformed(reason) => {
                debug!("skipping '{}' in '{}': {reason}", glyph.name(), subtable.name());
                continue;
            }
        };

        for entry in entries {
            let PosSub::Substitution(target) = entry else {
                continue;
            };

            if font.contains(target) {
                pairs.push((glyph.name().to_owned(), target.clone()));
            } else {
                skipped.push(SkippedPair {
                    base: glyph.name().to_owned(),
                    alternate: target.clone(),
                    reason: SkipReason::MissingGlyph,
                });
            }
        }
    }

    pairs
}
