//! Owned, editable representation of a font's glyphs and substitution lookups.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::debug;
use thiserror::Error;
use write_fonts::read::{tables::glyf::CompositeGlyph, FontData, FontRead};
use write_fonts::types::Tag;

/// Size of the header every non-empty `glyf` record starts with.
const GLYPH_HEADER_LEN: usize = 10;

/// Horizontal metrics of a single glyph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    /// Advance width in font units.
    pub advance_width: u16,
    /// Left side bearing in font units.
    pub left_side_bearing: i16,
}

/// A glyph's outline, kept as its TrueType `glyf` record or CFF charstring.
///
/// Composite outlines reference other glyphs by glyph index and charstrings
/// call subroutines shared by the whole font, so copying either between
/// glyphs of the same font is exact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Outline {
    /// A glyph without contours, such as a space.
    #[default]
    Empty,
    /// A glyph made of its own contours.
    Simple(Vec<u8>),
    /// A glyph assembled from references to other glyphs.
    Composite(Vec<u8>),
    /// A Type 2 charstring from a `CFF ` table.
    CharString(Vec<u8>),
}

impl Outline {
    /// Classifies a raw `glyf` record, or returns `None` if it is too short
    /// to hold a glyph header.
    #[must_use]
    pub fn from_record(record: &[u8]) -> Option<Self> {
        if record.is_empty() {
            return Some(Outline::Empty);
        }

        let header = record.get(..GLYPH_HEADER_LEN)?;
        let number_of_contours = i16::from_be_bytes([header[0], header[1]]);
        if number_of_contours < 0 {
            Some(Outline::Composite(record.to_vec()))
        } else {
            Some(Outline::Simple(record.to_vec()))
        }
    }

    /// The raw `glyf` record or charstring.
    #[must_use]
    pub fn record(&self) -> &[u8] {
        match self {
            Outline::Empty => &[],
            Outline::Simple(record) | Outline::Composite(record) | Outline::CharString(record) => {
                record
            }
        }
    }

    /// Glyph indices referenced by a composite outline.
    #[must_use]
    pub fn components(&self) -> Vec<u16> {
        let Outline::Composite(record) = self else {
            return Vec::new();
        };

        match CompositeGlyph::read(FontData::new(record)) {
            Ok(glyph) => glyph.components().map(|component| component.glyph.to_u16()).collect(),
            Err(err) => {
                debug!("unreadable composite record: {err}");
                Vec::new()
            }
        }
    }
}

/// A named glyph with its outline and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    name: String,
    outline: Outline,
    metrics: Metrics,
}

impl Glyph {
    /// Creates a glyph.
    pub fn new(name: impl Into<String>, outline: Outline, metrics: Metrics) -> Self {
        Self { name: name.into(), outline, metrics }
    }

    /// The glyph's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The glyph's outline.
    #[must_use]
    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    /// The glyph's horizontal metrics.
    #[must_use]
    pub fn metrics(&self) -> Metrics {
        self.metrics
    }
}

/// One (feature, script, language) association of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureTriple {
    /// Feature tag, e.g. `ss01`.
    pub feature: Tag,
    /// Script tag, e.g. `latn`.
    pub script: Tag,
    /// Language system tag; `dflt` for a script's default language system.
    pub language: Tag,
}

/// The GSUB lookup type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// Type 1: one glyph to one glyph.
    Single,
    /// Type 2: one glyph to a sequence.
    Multiple,
    /// Type 3: one glyph to one of several alternates.
    Alternate,
    /// Type 4: a sequence to one glyph.
    Ligature,
    /// Type 5.
    Contextual,
    /// Type 6.
    ChainContextual,
    /// Type 8.
    ReverseChainSingle,
    /// Type 7 whose wrapped lookup type could not be read.
    Extension,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LookupKind::Single => "single substitution",
            LookupKind::Multiple => "multiple substitution",
            LookupKind::Alternate => "alternate substitution",
            LookupKind::Ligature => "ligature substitution",
            LookupKind::Contextual => "contextual substitution",
            LookupKind::ChainContextual => "chained contextual substitution",
            LookupKind::ReverseChainSingle => "reverse chained single substitution",
            LookupKind::Extension => "extension substitution",
        };
        f.write_str(name)
    }
}

/// Substitution data a subtable holds for one glyph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PosSub {
    /// The glyph is replaced by the named glyph.
    Substitution(String),
    /// The glyph may be replaced by any of the named glyphs.
    AlternateSubstitution(Vec<String>),
    /// The glyph is replaced by the named sequence.
    MultipleSubstitution(Vec<String>),
    /// The glyph replaces the named component sequence.
    Ligature(Vec<String>),
}

/// Outcome of asking a subtable about one glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosSubQuery<'a> {
    /// The subtable has entries for the glyph.
    Found(&'a [PosSub]),
    /// The subtable does not mention the glyph.
    NotFound,
    /// The subtable's data for the glyph could not be decoded.
    Malformed(&'a str),
}

/// A single rule table within a lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subtable {
    name: String,
    entries: HashMap<String, Vec<PosSub>>,
    malformed: HashMap<String, String>,
    unreadable: Option<String>,
}

impl Subtable {
    /// Creates an empty subtable.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Creates a subtable whose data could not be decoded at all; every
    /// query on it reports `reason`.
    pub fn unreadable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { name: name.into(), unreadable: Some(reason.into()), ..Self::default() }
    }

    /// The subtable's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records an entry for `glyph`.
    pub fn push(&mut self, glyph: impl Into<String>, entry: PosSub) {
        self.entries.entry(glyph.into()).or_default().push(entry);
    }

    /// Records that the data for `glyph` is malformed.
    pub fn mark_malformed(&mut self, glyph: impl Into<String>, reason: impl Into<String>) {
        self.malformed.insert(glyph.into(), reason.into());
    }

    /// Looks up the entries this subtable holds for `glyph`.
    #[must_use]
    pub fn query(&self, glyph: &str) -> PosSubQuery<'_> {
        if let Some(reason) = &self.unreadable {
            return PosSubQuery::Malformed(reason);
        }
        if let Some(reason) = self.malformed.get(glyph) {
            return PosSubQuery::Malformed(reason);
        }
        match self.entries.get(glyph) {
            Some(entries) => PosSubQuery::Found(entries),
            None => PosSubQuery::NotFound,
        }
    }
}

/// A named GSUB lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    name: String,
    kind: LookupKind,
    features: Vec<FeatureTriple>,
    subtables: Vec<Subtable>,
}

impl Lookup {
    /// Creates a lookup without features or subtables.
    pub fn new(name: impl Into<String>, kind: LookupKind) -> Self {
        Self { name: name.into(), kind, features: Vec::new(), subtables: Vec::new() }
    }

    /// The lookup's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lookup's type.
    #[must_use]
    pub fn kind(&self) -> LookupKind {
        self.kind
    }

    /// Every (feature, script, language) this lookup is registered under.
    #[must_use]
    pub fn features(&self) -> &[FeatureTriple] {
        &self.features
    }

    /// The lookup's subtables, in order.
    #[must_use]
    pub fn subtables(&self) -> &[Subtable] {
        &self.subtables
    }

    /// Registers the lookup under another feature triple. Duplicates are ignored.
    pub fn add_feature(&mut self, triple: FeatureTriple) {
        if !self.features.contains(&triple) {
            self.features.push(triple);
        }
    }

    /// Appends a subtable.
    pub fn push_subtable(&mut self, subtable: Subtable) {
        self.subtables.push(subtable);
    }

    /// Whether any of the lookup's triples names `feature`.
    #[must_use]
    pub fn implements(&self, feature: Tag) -> bool {
        self.features.iter().any(|triple| triple.feature == feature)
    }
}

/// Result of [`Font::copy_glyph`] when the copy could be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The target now carries the source's outline and metrics.
    Replaced,
    /// The target already had the source's outline and metrics.
    Unchanged,
}

/// Reasons [`Font::copy_glyph`] refuses to copy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CopyError {
    /// One of the named glyphs is not in the font.
    #[error("glyph '{0}' is not in the font")]
    UnknownGlyph(String),
    /// The source outline references the target, so the copy would make the
    /// target reference itself.
    #[error("'{source_glyph}' is built from components that include '{target}'")]
    ComponentCycle {
        /// Glyph being copied from.
        source_glyph: String,
        /// Glyph being copied onto.
        target: String,
    },
}

/// A font: glyphs in glyph order plus its GSUB lookups.
#[derive(Debug, Clone, Default)]
pub struct Font {
    glyphs: Vec<Glyph>,
    index: HashMap<String, usize>,
    lookups: Vec<Lookup>,
    source: Vec<u8>,
}

impl Font {
    /// Creates a font from glyphs in glyph order and its lookups.
    ///
    /// A font built this way has no binary tables to carry over, so it can
    /// be frozen but not saved.
    #[must_use]
    pub fn new(glyphs: Vec<Glyph>, lookups: Vec<Lookup>) -> Self {
        Self::with_source(glyphs, lookups, Vec::new())
    }

    pub(crate) fn with_source(glyphs: Vec<Glyph>, lookups: Vec<Lookup>, source: Vec<u8>) -> Self {
        let mut index = HashMap::with_capacity(glyphs.len());
        for (position, glyph) in glyphs.iter().enumerate() {
            index.entry(glyph.name.clone()).or_insert(position);
        }
        Self { glyphs, index, lookups, source }
    }

    /// The font file this model was read from; empty for in-memory fonts.
    pub(crate) fn source(&self) -> &[u8] {
        &self.source
    }

    /// All glyphs in glyph order.
    #[must_use]
    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// The glyph called `name`.
    #[must_use]
    pub fn glyph(&self, name: &str) -> Option<&Glyph> {
        self.index.get(name).map(|&position| &self.glyphs[position])
    }

    /// Whether a glyph called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The GSUB lookups, in lookup list order.
    #[must_use]
    pub fn lookups(&self) -> &[Lookup] {
        &self.lookups
    }

    /// Overwrites the outline and metrics of glyph `to` with those of `from`.
    /// `from` is left untouched.
    ///
    /// # Errors
    ///
    /// Fails if either glyph is missing, or if `from` is a composite that
    /// (possibly through nested components) references `to`.
    pub fn copy_glyph(&mut self, from: &str, to: &str) -> Result<CopyOutcome, CopyError> {
        let source = *self.index.get(from).ok_or_else(|| CopyError::UnknownGlyph(from.to_owned()))?;
        let target = *self.index.get(to).ok_or_else(|| CopyError::UnknownGlyph(to.to_owned()))?;

        let (outline, metrics) = {
            let glyph = &self.glyphs[source];
            (glyph.outline.clone(), glyph.metrics)
        };

        let current = &self.glyphs[target];
        if current.outline == outline && current.metrics == metrics {
            return Ok(CopyOutcome::Unchanged);
        }

        if self.references(source, target) {
            return Err(CopyError::ComponentCycle {
                source_glyph: from.to_owned(),
                target: to.to_owned(),
            });
        }

        let glyph = &mut self.glyphs[target];
        glyph.outline = outline;
        glyph.metrics = metrics;
        Ok(CopyOutcome::Replaced)
    }

    /// Whether the outline of glyph `from` reaches glyph `target` through
    /// its components.
    fn references(&self, from: usize, target: usize) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![from];

        while let Some(position) = pending.pop() {
            if !visited.insert(position) {
                continue;
            }
            let Some(glyph) = self.glyphs.get(position) else {
                continue;
            };
            for component in glyph.outline.components() {
                let component = usize::from(component);
                if component == target {
                    return true;
                }
                pending.push(component);
            }
        }

        false
    }
}
