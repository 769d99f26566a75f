//! Reading OpenType files into a [`Font`] and compiling it back.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use log::debug;
use write_fonts::{
    read::{FontData, FontRef, ReadError, TableProvider},
    types::{GlyphId16, Tag},
    FontBuilder,
};

use crate::cff;
use crate::error::{Error, Result};
use crate::gsub;
use crate::model::{Font, Glyph, Metrics, Outline};

const CFF: Tag = Tag::new(b"CFF ");
const CFF2: Tag = Tag::new(b"CFF2");
const GLYF: Tag = Tag::new(b"glyf");
const GVAR: Tag = Tag::new(b"gvar");
const HEAD: Tag = Tag::new(b"head");
const HHEA: Tag = Tag::new(b"hhea");
const HMTX: Tag = Tag::new(b"hmtx");
const LOCA: Tag = Tag::new(b"loca");
const MAXP: Tag = Tag::new(b"maxp");

/// Tables rebuilt from the model on save.
const REBUILT_TABLES: [Tag; 7] = [CFF, GLYF, LOCA, HEAD, HHEA, HMTX, MAXP];

/// Tables whose contents no longer match once outlines or advances change.
const STALE_TABLES: [Tag; 4] = [
    Tag::new(b"hdmx"),
    Tag::new(b"LTSH"),
    Tag::new(b"VDMX"),
    Tag::new(b"DSIG"),
];

const HEAD_CHECKSUM_ADJUSTMENT: usize = 8;
const HEAD_INDEX_TO_LOC_FORMAT: usize = 50;
const HHEA_ADVANCE_WIDTH_MAX: usize = 10;
const HHEA_NUMBER_OF_H_METRICS: usize = 34;
const MAXP_VERSION_1: u32 = 0x0001_0000;
const MAXP_COMPOSITE_POINTS: usize = 10;
const MAXP_COMPOSITE_CONTOURS: usize = 12;
const MAXP_COMPONENT_ELEMENTS: usize = 28;
const MAXP_COMPONENT_DEPTH: usize = 30;
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

impl Font {
    /// Reads the font at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not an OpenType font with
    /// TrueType or name-keyed CFF outlines.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data =
            fs::read(path).map_err(|source| Error::Read { path: path.to_owned(), source })?;
        Self::from_bytes(data)
    }

    /// Parses a font from the contents of a font file.
    ///
    /// # Errors
    ///
    /// Fails if the data is malformed, lacks a required table, or stores
    /// CID-keyed CFF, CFF2 outlines or glyph variations.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let (glyphs, lookups) = {
            let font = FontRef::new(&data)?;
            check_outline_format(&font)?;

            let num_glyphs = font.maxp()?.num_glyphs();
            let names = glyph_names(&font, num_glyphs);
            let outlines = match font.table_data(CFF) {
                Some(table) => cff::read_charstrings(table.as_bytes(), num_glyphs)?
                    .into_iter()
                    .map(Outline::CharString)
                    .collect(),
                None => read_outlines(&font, num_glyphs)?,
            };
            let metrics = read_metrics(&font, num_glyphs)?;
            let lookups = gsub::read_lookups(&font, &names)?;

            let glyphs = names
                .into_iter()
                .zip(outlines)
                .zip(metrics)
                .map(|((name, outline), metrics)| Glyph::new(name, outline, metrics))
                .collect();
            (glyphs, lookups)
        };

        Ok(Self::with_source(glyphs, lookups, data))
    }

    /// Writes the font to `path`, whose extension must be `ttf` or `otf`.
    ///
    /// # Errors
    ///
    /// Fails on an unsupported extension, if the font was not read from a
    /// font file, or if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        check_output_format(path)?;
        let data = self.to_bytes()?;
        fs::write(path, data).map_err(|source| Error::Write { path: path.to_owned(), source })
    }

    /// Compiles the font into the bytes of a font file.
    ///
    /// The outline table (`glyf` and `loca`, or the CharStrings of `CFF `),
    /// `hmtx`, and the fields of `head`, `hhea` and `maxp` that describe
    /// them are rebuilt. For TrueType outlines that includes the composite
    /// limits of `maxp`. Other tables are copied from the source font, except
    /// for device metrics and signatures that would be stale.
    ///
    /// # Errors
    ///
    /// Fails if the font was not read from a font file, or if its outlines
    /// do not match the source font's outline format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let source = FontRef::new(self.source())?;
        let glyphs = self.glyphs();

        let (hmtx, advance_width_max) = build_hmtx(glyphs);
        let num_h_metrics = u16::try_from(glyphs.len()).map_err(|_| ReadError::OutOfBounds)?;

        let mut head = table_bytes(&source, HEAD, "head")?;
        write_at(&mut head, HEAD_CHECKSUM_ADJUSTMENT, &[0; 4])?;

        let mut hhea = table_bytes(&source, HHEA, "hhea")?;
        write_at(&mut hhea, HHEA_ADVANCE_WIDTH_MAX, &advance_width_max.to_be_bytes())?;
        write_at(&mut hhea, HHEA_NUMBER_OF_H_METRICS, &num_h_metrics.to_be_bytes())?;

        let mut maxp = table_bytes(&source, MAXP, "maxp")?;
        let mut builder = FontBuilder::new();

        if let Some(table) = source.table_data(CFF) {
            let charstrings = charstrings(glyphs)?;
            builder.add_raw(CFF, cff::replace_charstrings(table.as_bytes(), &charstrings)?);
        } else {
            let (glyf, loca, long_loca) = build_glyf_loca(glyphs)?;
            write_at(&mut head, HEAD_INDEX_TO_LOC_FORMAT, &i16::from(long_loca).to_be_bytes())?;
            update_composite_limits(&mut maxp, glyphs)?;
            builder.add_raw(LOCA, loca).add_raw(GLYF, glyf);
        }

        builder
            .add_raw(HEAD, head)
            .add_raw(HHEA, hhea)
            .add_raw(HMTX, hmtx)
            .add_raw(MAXP, maxp);

        for record in source.table_directory.table_records() {
            let tag = record.tag();
            if REBUILT_TABLES.contains(&tag) {
                continue;
            }
            if STALE_TABLES.contains(&tag) {
                debug!("dropping stale '{tag}' table");
                continue;
            }
            if let Some(data) = source.table_data(tag) {
                builder.add_raw(tag, data.as_bytes());
            }
        }

        let mut data = builder.build();
        fix_checksum_adjustment(&mut data)?;
        Ok(data)
    }
}

/// Name used for a glyph the font has no name for.
fn fallback_glyph_name(glyph: u16) -> String {
    format!("glyph{glyph:05}")
}

/// Checks that `path` names a container format fonts can be saved as.
pub(crate) fn check_output_format(path: &Path) -> Result<()> {
    match path.extension().and_then(OsStr::to_str) {
        Some(extension)
            if extension.eq_ignore_ascii_case("ttf") || extension.eq_ignore_ascii_case("otf") =>
        {
            Ok(())
        }
        _ => Err(Error::UnsupportedFormat(path.to_owned())),
    }
}

fn check_outline_format(font: &FontRef) -> Result<()> {
    if font.table_data(CFF2).is_some() {
        return Err(Error::UnsupportedOutlines("CFF2 outlines"));
    }
    if font.table_data(GVAR).is_some() {
        return Err(Error::UnsupportedOutlines("glyph variations (gvar)"));
    }
    Ok(())
}

/// Glyph names from `post`, with generated names where `post` has none or
/// repeats one.
fn glyph_names(font: &FontRef, num_glyphs: u16) -> Vec<String> {
    let post = font.post().ok();
    let mut seen = HashSet::with_capacity(usize::from(num_glyphs));

    (0..num_glyphs)
        .map(|glyph| {
            let named = post
                .as_ref()
                .and_then(|post| post.glyph_name(GlyphId16::new(glyph)))
                .filter(|name| !name.is_empty() && !seen.contains(*name))
                .map(str::to_owned);

            let mut name = named.unwrap_or_else(|| fallback_glyph_name(glyph));
            let mut suffix = 1;
            while seen.contains(&name) {
                name = format!("{}#{suffix}", fallback_glyph_name(glyph));
                suffix += 1;
            }

            seen.insert(name.clone());
            name
        })
        .collect()
}

fn read_outlines(font: &FontRef, num_glyphs: u16) -> Result<Vec<Outline>> {
    let long_loca = font.head()?.index_to_loc_format() == 1;
    let loca = font.table_data(LOCA).ok_or(Error::MissingTable("loca"))?;
    let glyf = font.table_data(GLYF).ok_or(Error::MissingTable("glyf"))?;

    let offset = |index: usize| -> Result<usize> {
        Ok(if long_loca {
            loca.read_at::<u32>(index * 4)? as usize
        } else {
            usize::from(loca.read_at::<u16>(index * 2)?) * 2
        })
    };

    (0..num_glyphs)
        .map(|glyph| -> Result<Outline> {
            let index = usize::from(glyph);
            let (start, end) = (offset(index)?, offset(index + 1)?);
            glyf.as_bytes()
                .get(start..end)
                .and_then(Outline::from_record)
                .ok_or(Error::MalformedGlyph(glyph))
        })
        .collect()
}

fn read_metrics(font: &FontRef, num_glyphs: u16) -> Result<Vec<Metrics>> {
    let hhea = font.table_data(HHEA).ok_or(Error::MissingTable("hhea"))?;
    let hmtx = font.table_data(HMTX).ok_or(Error::MissingTable("hmtx"))?;

    let long_metrics = usize::from(hhea.read_at::<u16>(HHEA_NUMBER_OF_H_METRICS)?);
    if long_metrics == 0 {
        return Err(ReadError::MalformedData("hhea declares no horizontal metrics").into());
    }

    (0..usize::from(num_glyphs))
        .map(|glyph| -> Result<Metrics> {
            let metrics = if glyph < long_metrics {
                Metrics {
                    advance_width: hmtx.read_at::<u16>(glyph * 4)?,
                    left_side_bearing: hmtx.read_at::<i16>(glyph * 4 + 2)?,
                }
            } else {
                let trailing = long_metrics * 4 + (glyph - long_metrics) * 2;
                Metrics {
                    advance_width: hmtx.read_at::<u16>((long_metrics - 1) * 4)?,
                    left_side_bearing: hmtx.read_at::<i16>(trailing)?,
                }
            };
            Ok(metrics)
        })
        .collect()
}

/// Lays out `glyf` with 4-byte aligned records and the matching `loca`.
/// Returns whether `loca` needed the long format.
fn build_glyf_loca(glyphs: &[Glyph]) -> Result<(Vec<u8>, Vec<u8>, bool)> {
    let mut glyf = Vec::new();
    let mut offsets = Vec::with_capacity(glyphs.len() + 1);

    for glyph in glyphs {
        let record = match glyph.outline() {
            Outline::CharString(_) => {
                return Err(Error::UnsupportedOutlines("CFF charstrings in a glyf font"))
            }
            outline => outline.record(),
        };
        offsets.push(glyf.len());
        glyf.extend_from_slice(record);
        glyf.resize(glyf.len().next_multiple_of(4), 0);
    }
    offsets.push(glyf.len());

    if u32::try_from(glyf.len()).is_err() {
        return Err(ReadError::MalformedData("glyf table exceeds 4 GiB").into());
    }

    let long_loca = glyf.len() > usize::from(u16::MAX) * 2;
    #[allow(clippy::cast_possible_truncation)]
    let loca = if long_loca {
        offsets.iter().flat_map(|&offset| (offset as u32).to_be_bytes()).collect()
    } else {
        offsets.iter().flat_map(|&offset| ((offset / 2) as u16).to_be_bytes()).collect()
    };

    Ok((glyf, loca, long_loca))
}

/// The charstring of every glyph, in glyph order.
fn charstrings(glyphs: &[Glyph]) -> Result<Vec<&[u8]>> {
    glyphs
        .iter()
        .map(|glyph| match glyph.outline() {
            Outline::CharString(charstring) => Ok(charstring.as_slice()),
            _ => Err(Error::UnsupportedOutlines("TrueType outlines in a CFF font")),
        })
        .collect()
}

/// Point and contour totals of a glyph with its components flattened, and
/// how deeply its components nest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flattened {
    points: u32,
    contours: u32,
    depth: u16,
}

/// Rewrites the composite glyph limits of a version 1.0 `maxp` table.
fn update_composite_limits(maxp: &mut [u8], glyphs: &[Glyph]) -> Result<()> {
    if FontData::new(maxp).read_at::<u32>(0)? != MAXP_VERSION_1 {
        return Ok(());
    }

    let mut memo = vec![None; glyphs.len()];
    let (mut points, mut contours, mut elements, mut depth) = (0u16, 0u16, 0u16, 0u16);
    for (index, glyph) in glyphs.iter().enumerate() {
        let components = glyph.outline().components();
        if components.is_empty() {
            continue;
        }
        let flattened = flatten(glyphs, index, &mut memo);
        points = points.max(u16::try_from(flattened.points).unwrap_or(u16::MAX));
        contours = contours.max(u16::try_from(flattened.contours).unwrap_or(u16::MAX));
        elements = elements.max(u16::try_from(components.len()).unwrap_or(u16::MAX));
        depth = depth.max(flattened.depth);
    }

    write_at(maxp, MAXP_COMPOSITE_POINTS, &points.to_be_bytes())?;
    write_at(maxp, MAXP_COMPOSITE_CONTOURS, &contours.to_be_bytes())?;
    write_at(maxp, MAXP_COMPONENT_ELEMENTS, &elements.to_be_bytes())?;
    write_at(maxp, MAXP_COMPONENT_DEPTH, &depth.to_be_bytes())
}

/// Flattens glyph `index`. A component loop counts as an empty glyph where
/// it closes.
fn flatten(glyphs: &[Glyph], index: usize, memo: &mut [Option<Flattened>]) -> Flattened {
    let Some(glyph) = glyphs.get(index) else {
        return Flattened::default();
    };
    if let Some(done) = memo[index] {
        return done;
    }
    memo[index] = Some(Flattened::default());

    let flattened = match glyph.outline() {
        Outline::Simple(record) => simple_counts(record),
        Outline::Composite(_) => {
            let mut total = Flattened::default();
            for component in glyph.outline().components() {
                let part = flatten(glyphs, usize::from(component), memo);
                total.points += part.points;
                total.contours += part.contours;
                total.depth = total.depth.max(part.depth);
            }
            total.depth += 1;
            total
        }
        Outline::Empty | Outline::CharString(_) => Flattened::default(),
    };
    memo[index] = Some(flattened);
    flattened
}

/// Points and contours of a simple `glyf` record.
fn simple_counts(record: &[u8]) -> Flattened {
    let data = FontData::new(record);
    let contours = data.read_at::<i16>(0).map_or(0, |count| u32::from(count.unsigned_abs()));
    let points = contours
        .checked_sub(1)
        .and_then(|last| data.read_at::<u16>(10 + 2 * last as usize).ok())
        .map_or(0, |end_point| u32::from(end_point) + 1);
    Flattened { points, contours, depth: 0 }
}

/// Writes one long metric per glyph. Returns the table and the largest advance.
fn build_hmtx(glyphs: &[Glyph]) -> (Vec<u8>, u16) {
    let mut hmtx = Vec::with_capacity(glyphs.len() * 4);
    let mut advance_width_max = 0;

    for glyph in glyphs {
        let metrics = glyph.metrics();
        advance_width_max = advance_width_max.max(metrics.advance_width);
        hmtx.extend_from_slice(&metrics.advance_width.to_be_bytes());
        hmtx.extend_from_slice(&metrics.left_side_bearing.to_be_bytes());
    }

    (hmtx, advance_width_max)
}

fn table_bytes(font: &FontRef, tag: Tag, name: &'static str) -> Result<Vec<u8>> {
    font.table_data(tag)
        .map(|data| data.as_bytes().to_vec())
        .ok_or(Error::MissingTable(name))
}

fn write_at(table: &mut [u8], offset: usize, bytes: &[u8]) -> Result<()> {
    table
        .get_mut(offset..offset + bytes.len())
        .ok_or(ReadError::OutOfBounds)?
        .copy_from_slice(bytes);
    Ok(())
}

fn fix_checksum_adjustment(data: &mut [u8]) -> Result<()> {
    let head_offset = FontRef::new(data)?
        .table_directory
        .table_records()
        .iter()
        .find(|record| record.tag() == HEAD)
        .map(|record| record.offset() as usize)
        .ok_or(Error::MissingTable("head"))?;

    let field = head_offset + HEAD_CHECKSUM_ADJUSTMENT;
    write_at(data, field, &[0; 4])?;
    let adjustment = CHECKSUM_MAGIC.wrapping_sub(checksum(data));
    write_at(data, field, &adjustment.to_be_bytes())
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}
