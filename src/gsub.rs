//! Decoding of the `GSUB` table into [`Lookup`]s.

use std::iter;

use log::{debug, warn};
use write_fonts::read::{
    tables::gsub::{
        AlternateSubstFormat1, ExtensionSubtable, Gsub, LigatureSubstFormat1, MultipleSubstFormat1,
        SingleSubst, SubstitutionLookup,
    },
    FontRef, ReadError, TableProvider,
};
use write_fonts::types::{GlyphId16, Tag};

use crate::model::{FeatureTriple, Lookup, LookupKind, PosSub, Subtable};

const GSUB: Tag = Tag::new(b"GSUB");
const DEFAULT_LANGUAGE: Tag = Tag::new(b"dflt");
const NO_REQUIRED_FEATURE: u16 = 0xFFFF;

fn glyph_name(names: &[String], glyph: GlyphId16) -> Option<String> {
    names.get(usize::from(glyph.to_u16())).cloned()
}

/// Names every glyph of `glyphs`, or `None` if one lies outside the font.
fn glyph_names(
    names: &[String],
    glyphs: impl IntoIterator<Item = GlyphId16>,
) -> Option<Vec<String>> {
    glyphs.into_iter().map(|glyph| glyph_name(names, glyph)).collect()
}

fn outside_the_font(glyph: GlyphId16) -> String {
    format!("glyph id {} is outside the font", glyph.to_u16())
}

/// Reads every GSUB lookup with its feature triples and decoded subtables.
/// A font without a `GSUB` table has no lookups.
pub(crate) fn read_lookups(font: &FontRef, names: &[String]) -> Result<Vec<Lookup>, ReadError> {
    if font.table_data(GSUB).is_none() {
        return Ok(Vec::new());
    }

    let gsub = font.gsub()?;
    let lookup_list = gsub.lookup_list()?;
    let mut triples = feature_triples(&gsub, usize::from(lookup_list.lookup_count()))?;

    let mut lookups = Vec::with_capacity(triples.len());
    for (index, lookup) in lookup_list.lookups().iter().enumerate() {
        let mut lookup = decode_lookup(&format!("lookup-{index}"), lookup?, names);
        for triple in triples.get_mut(index).map(std::mem::take).unwrap_or_default() {
            lookup.add_feature(triple);
        }
        debug!(
            "read {} '{}' with {} subtable(s)",
            lookup.kind(),
            lookup.name(),
            lookup.subtables().len()
        );
        lookups.push(lookup);
    }

    Ok(lookups)
}

/// Collects, per lookup index, the feature triples that reach the lookup
/// through the script and feature lists.
fn feature_triples(
    gsub: &Gsub,
    lookup_count: usize,
) -> Result<Vec<Vec<FeatureTriple>>, ReadError> {
    let script_list = gsub.script_list()?;
    let feature_list = gsub.feature_list()?;
    let feature_records = feature_list.feature_records();
    let mut triples = vec![Vec::new(); lookup_count];

    for script_record in script_list.script_records() {
        let script_tag = script_record.script_tag();
        let script = script_record.script(script_list.offset_data())?;

        let mut lang_systems = Vec::new();
        if let Some(default) = script.default_lang_sys() {
            lang_systems.push((DEFAULT_LANGUAGE, default?));
        }
        for record in script.lang_sys_records() {
            lang_systems.push((record.lang_sys_tag(), record.lang_sys(script.offset_data())?));
        }

        for (language, lang_sys) in lang_systems {
            let required = Some(lang_sys.required_feature_index())
                .filter(|&index| index != NO_REQUIRED_FEATURE);
            let indices = lang_sys
                .feature_indices()
                .iter()
                .map(|index| index.get())
                .chain(required);

            for feature_index in indices {
                let Some(record) = feature_records.get(usize::from(feature_index)) else {
                    warn!(
                        "script '{script_tag}' language '{language}' \
                         references missing feature {feature_index}"
                    );
                    continue;
                };
                let feature = record.feature(feature_list.offset_data())?;
                let triple = FeatureTriple {
                    feature: record.feature_tag(),
                    script: script_tag,
                    language,
                };

                for lookup_index in feature.lookup_list_indices() {
                    let lookup_index = lookup_index.get();
                    match triples.get_mut(usize::from(lookup_index)) {
                        Some(list) if !list.contains(&triple) => list.push(triple),
                        Some(_) => {}
                        None => warn!(
                            "feature '{}' references missing lookup {lookup_index}",
                            triple.feature
                        ),
                    }
                }
            }
        }
    }

    Ok(triples)
}

fn decode_lookup(name: &str, lookup: SubstitutionLookup, names: &[String]) -> Lookup {
    let (kind, subtables) = match lookup {
        SubstitutionLookup::Single(lookup) => (
            LookupKind::Single,
            decode_subtables(name, lookup.subtables().iter(), names, decode_single),
        ),
        SubstitutionLookup::Multiple(lookup) => (
            LookupKind::Multiple,
            decode_subtables(name, lookup.subtables().iter(), names, decode_multiple),
        ),
        SubstitutionLookup::Alternate(lookup) => (
            LookupKind::Alternate,
            decode_subtables(name, lookup.subtables().iter(), names, decode_alternate),
        ),
        SubstitutionLookup::Ligature(lookup) => (
            LookupKind::Ligature,
            decode_subtables(name, lookup.subtables().iter(), names, decode_ligature),
        ),
        SubstitutionLookup::Contextual(lookup) => (
            LookupKind::Contextual,
            decode_subtables(name, lookup.subtables().iter(), names, no_entries),
        ),
        SubstitutionLookup::ChainContextual(lookup) => (
            LookupKind::ChainContextual,
            decode_subtables(name, lookup.subtables().iter(), names, no_entries),
        ),
        SubstitutionLookup::Reverse(lookup) => (
            LookupKind::ReverseChainSingle,
            decode_subtables(name, lookup.subtables().iter(), names, no_entries),
        ),
        SubstitutionLookup::Extension(lookup) => {
            let kind = lookup
                .subtables()
                .iter()
                .find_map(Result::ok)
                .map_or(LookupKind::Extension, |subtable| extension_kind(&subtable));
            (kind, decode_subtables(name, lookup.subtables().iter(), names, decode_extension))
        }
    };

    let mut decoded = Lookup::new(name, kind);
    for subtable in subtables {
        decoded.push_subtable(subtable);
    }
    decoded
}

/// Decodes each subtable into a [`Subtable`] named after its lookup and
/// position. A subtable that fails to decode as a whole becomes unreadable.
fn decode_subtables<T>(
    lookup_name: &str,
    subtables: impl Iterator<Item = Result<T, ReadError>>,
    names: &[String],
    decode: impl Fn(&T, &[String], &mut Subtable) -> Result<(), ReadError>,
) -> Vec<Subtable> {
    subtables
        .enumerate()
        .map(|(index, subtable)| {
            let name = format!("{lookup_name}-{index}");
            let mut decoded = Subtable::new(name.clone());
            match subtable.and_then(|subtable| decode(&subtable, names, &mut decoded)) {
                Ok(()) => decoded,
                Err(err) => {
                    debug!("subtable '{name}' is unreadable: {err}");
                    Subtable::unreadable(name, err.to_string())
                }
            }
        })
        .collect()
}

/// Records `glyph -> target`, or marks `glyph` malformed if `target` lies
/// outside the font. Coverage glyphs outside the font are dropped.
fn push_single(names: &[String], glyph: GlyphId16, target: GlyphId16, out: &mut Subtable) {
    let Some(base) = glyph_name(names, glyph) else {
        debug!("dropping coverage entry: {}", outside_the_font(glyph));
        return;
    };
    match glyph_name(names, target) {
        Some(target) => out.push(base, PosSub::Substitution(target)),
        None => out.mark_malformed(base, outside_the_font(target)),
    }
}

fn decode_single(
    subtable: &SingleSubst,
    names: &[String],
    out: &mut Subtable,
) -> Result<(), ReadError> {
    match subtable {
        SingleSubst::Format1(table) => {
            let delta = table.delta_glyph_id();
            for glyph in table.coverage()?.iter() {
                let target = GlyphId16::new(glyph.to_u16().wrapping_add_signed(delta));
                push_single(names, glyph, target, out);
            }
        }
        SingleSubst::Format2(table) => {
            let substitutes = table.substitute_glyph_ids();
            for (index, glyph) in table.coverage()?.iter().enumerate() {
                match substitutes.get(index) {
                    Some(target) => push_single(names, glyph, target.get(), out),
                    None => {
                        if let Some(base) = glyph_name(names, glyph) {
                            let reason = format!("coverage index {index} has no substitute");
                            out.mark_malformed(base, reason);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn decode_multiple(
    subtable: &MultipleSubstFormat1,
    names: &[String],
    out: &mut Subtable,
) -> Result<(), ReadError> {
    let sequences = subtable.sequences();
    for (index, glyph) in subtable.coverage()?.iter().enumerate() {
        let Some(base) = glyph_name(names, glyph) else {
            debug!("dropping coverage entry: {}", outside_the_font(glyph));
            continue;
        };
        match sequences.get(index) {
            Ok(sequence) => {
                let targets = sequence.substitute_glyph_ids().iter().map(|target| target.get());
                match glyph_names(names, targets) {
                    Some(targets) => out.push(base, PosSub::MultipleSubstitution(targets)),
                    None => out.mark_malformed(base, "sequence names a glyph outside the font"),
                }
            }
            Err(err) => out.mark_malformed(base, err.to_string()),
        }
    }
    Ok(())
}

fn decode_alternate(
    subtable: &AlternateSubstFormat1,
    names: &[String],
    out: &mut Subtable,
) -> Result<(), ReadError> {
    let alternate_sets = subtable.alternate_sets();
    for (index, glyph) in subtable.coverage()?.iter().enumerate() {
        let Some(base) = glyph_name(names, glyph) else {
            debug!("dropping coverage entry: {}", outside_the_font(glyph));
            continue;
        };
        match alternate_sets.get(index) {
            Ok(set) => {
                let targets = set.alternate_glyph_ids().iter().map(|target| target.get());
                match glyph_names(names, targets) {
                    Some(targets) => out.push(base, PosSub::AlternateSubstitution(targets)),
                    None => {
                        out.mark_malformed(base, "alternate set names a glyph outside the font");
                    }
                }
            }
            Err(err) => out.mark_malformed(base, err.to_string()),
        }
    }
    Ok(())
}

fn decode_ligature(
    subtable: &LigatureSubstFormat1,
    names: &[String],
    out: &mut Subtable,
) -> Result<(), ReadError> {
    let ligature_sets = subtable.ligature_sets();
    for (index, first) in subtable.coverage()?.iter().enumerate() {
        let set = match ligature_sets.get(index) {
            Ok(set) => set,
            Err(err) => {
                debug!("ligature set {index} is unreadable: {err}");
                continue;
            }
        };

        for ligature in set.ligatures().iter() {
            let ligature = match ligature {
                Ok(ligature) => ligature,
                Err(err) => {
                    debug!("ligature in set {index} is unreadable: {err}");
                    continue;
                }
            };
            let glyph = ligature.ligature_glyph();
            let Some(key) = glyph_name(names, glyph) else {
                debug!("dropping ligature: {}", outside_the_font(glyph));
                continue;
            };

            let components = iter::once(first)
                .chain(ligature.component_glyph_ids().iter().map(|glyph| glyph.get()));
            match glyph_names(names, components) {
                Some(components) => out.push(key, PosSub::Ligature(components)),
                None => out.mark_malformed(key, "ligature names a component outside the font"),
            }
        }
    }
    Ok(())
}

fn decode_extension(
    subtable: &ExtensionSubtable,
    names: &[String],
    out: &mut Subtable,
) -> Result<(), ReadError> {
    match subtable {
        ExtensionSubtable::Single(ext) => decode_single(&ext.extension()?, names, out),
        ExtensionSubtable::Multiple(ext) => decode_multiple(&ext.extension()?, names, out),
        ExtensionSubtable::Alternate(ext) => decode_alternate(&ext.extension()?, names, out),
        ExtensionSubtable::Ligature(ext) => decode_ligature(&ext.extension()?, names, out),
        _ => Ok(()),
    }
}

fn extension_kind(subtable: &ExtensionSubtable) -> LookupKind {
    match subtable {
        ExtensionSubtable::Single(_) => LookupKind::Single,
        ExtensionSubtable::Multiple(_) => LookupKind::Multiple,
        ExtensionSubtable::Alternate(_) => LookupKind::Alternate,
        ExtensionSubtable::Ligature(_) => LookupKind::Ligature,
        ExtensionSubtable::Contextual(_) => LookupKind::Contextual,
        ExtensionSubtable::ChainContextual(_) => LookupKind::ChainContextual,
        ExtensionSubtable::Reverse(_) => LookupKind::ReverseChainSingle,
    }
}

/// Contextual lookups carry no per-glyph substitution entries.
#[allow(clippy::unnecessary_wraps)]
fn no_entries<T>(_: &T, _: &[String], _: &mut Subtable) -> Result<(), ReadError> {
    Ok(())
}
