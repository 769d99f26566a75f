//! Reading and rewriting the CharStrings INDEX of a `CFF ` table.
//!
//! Only name-keyed fonts are handled: a CID-keyed font selects its private
//! dictionary per glyph, so a charstring is only valid under its own font
//! dictionary.

use std::ops::Range;

use write_fonts::read::{FontData, ReadError};

use crate::error::{Error, Result};

const OP_CHARSET: u16 = 15;
const OP_ENCODING: u16 = 16;
const OP_CHAR_STRINGS: u16 = 17;
const OP_PRIVATE: u16 = 18;
const OP_SUBRS: u16 = 19;
const OP_ROS: u16 = 0x0C1E;

/// `charset` operands below this select a predefined charset.
const PREDEFINED_CHARSETS: i32 = 3;
/// `Encoding` operands below this select a predefined encoding.
const PREDEFINED_ENCODINGS: i32 = 2;

/// Byte ranges of an INDEX within its table.
#[derive(Debug)]
struct Index {
    start: usize,
    end: usize,
    entries: Vec<Range<usize>>,
}

impl Index {
    fn read(data: FontData, start: usize) -> Result<Self> {
        let count = usize::from(data.read_at::<u16>(start)?);
        if count == 0 {
            return Ok(Index { start, end: start + 2, entries: Vec::new() });
        }

        let off_size = usize::from(data.read_at::<u8>(start + 2)?);
        if !(1..=4).contains(&off_size) {
            return Err(ReadError::MalformedData("CFF INDEX offset size out of range").into());
        }

        let offsets = start + 3;
        let base = offsets + (count + 1) * off_size - 1;
        let offset = |index: usize| -> Result<usize> {
            let at = offsets + index * off_size;
            let bytes = data.as_bytes().get(at..at + off_size).ok_or(ReadError::OutOfBounds)?;
            Ok(bytes.iter().fold(0, |value, &byte| value << 8 | usize::from(byte)))
        };

        let mut entries = Vec::with_capacity(count);
        let mut previous = offset(0)?;
        for index in 1..=count {
            let next = offset(index)?;
            if next < previous {
                return Err(ReadError::MalformedData("CFF INDEX offsets decrease").into());
            }
            entries.push(base + previous..base + next);
            previous = next;
        }

        let end = base + previous;
        if end > data.len() {
            return Err(ReadError::OutOfBounds.into());
        }
        Ok(Index { start, end, entries })
    }
}

/// Serializes `entries` as an INDEX with the smallest offset size that fits.
#[allow(clippy::cast_possible_truncation)]
fn write_index(entries: &[&[u8]]) -> Result<Vec<u8>> {
    let count = u16::try_from(entries.len())
        .map_err(|_| ReadError::MalformedData("too many CFF INDEX entries"))?;
    let mut out = count.to_be_bytes().to_vec();
    if entries.is_empty() {
        return Ok(out);
    }

    let last_offset = entries.iter().map(|entry| entry.len()).sum::<usize>() + 1;
    let last_offset = u32::try_from(last_offset)
        .map_err(|_| ReadError::MalformedData("CFF INDEX data too large"))?;
    let off_size = match last_offset {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    };
    out.push(off_size as u8);

    let mut offset = 1u32;
    out.extend_from_slice(&offset.to_be_bytes()[4 - off_size..]);
    for entry in entries {
        offset += entry.len() as u32;
        out.extend_from_slice(&offset.to_be_bytes()[4 - off_size..]);
    }
    for entry in entries {
        out.extend_from_slice(entry);
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Int(i32),
    /// A real number, kept in its encoded form.
    Real(Vec<u8>),
    /// An offset, always written as a 5-byte integer.
    Offset(i32),
}

#[derive(Debug, Clone, PartialEq)]
struct DictEntry {
    operator: u16,
    operands: Vec<Operand>,
}

fn parse_dict(data: &[u8]) -> Result<Vec<DictEntry>> {
    let byte = |at: usize| data.get(at).copied().ok_or(ReadError::OutOfBounds);
    let mut entries = Vec::new();
    let mut operands = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let b0 = byte(pos)?;
        match b0 {
            12 => {
                let operator = 0x0C00 | u16::from(byte(pos + 1)?);
                entries.push(DictEntry { operator, operands: std::mem::take(&mut operands) });
                pos += 2;
            }
            0..=21 => {
                let operator = u16::from(b0);
                entries.push(DictEntry { operator, operands: std::mem::take(&mut operands) });
                pos += 1;
            }
            28 => {
                let value = i16::from_be_bytes([byte(pos + 1)?, byte(pos + 2)?]);
                operands.push(Operand::Int(i32::from(value)));
                pos += 3;
            }
            29 => {
                let value = FontData::new(data).read_at::<i32>(pos + 1)?;
                operands.push(Operand::Int(value));
                pos += 5;
            }
            30 => {
                let end = data[pos + 1..]
                    .iter()
                    .position(|&nibbles| nibbles & 0x0F == 0x0F || nibbles & 0xF0 == 0xF0)
                    .map(|len| pos + 2 + len)
                    .ok_or(ReadError::MalformedData("unterminated real in CFF DICT"))?;
                operands.push(Operand::Real(data[pos..end].to_vec()));
                pos = end;
            }
            32..=246 => {
                operands.push(Operand::Int(i32::from(b0) - 139));
                pos += 1;
            }
            247..=250 => {
                let value = (i32::from(b0) - 247) * 256 + i32::from(byte(pos + 1)?) + 108;
                operands.push(Operand::Int(value));
                pos += 2;
            }
            251..=254 => {
                let value = -(i32::from(b0) - 251) * 256 - i32::from(byte(pos + 1)?) - 108;
                operands.push(Operand::Int(value));
                pos += 2;
            }
            _ => return Err(ReadError::MalformedData("reserved byte in CFF DICT").into()),
        }
    }

    Ok(entries)
}

fn write_dict(entries: &[DictEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in entries {
        for operand in &entry.operands {
            match *operand {
                Operand::Int(value) => write_int(&mut out, value),
                Operand::Real(ref encoded) => out.extend_from_slice(encoded),
                Operand::Offset(value) => {
                    out.push(29);
                    out.extend_from_slice(&value.to_be_bytes());
                }
            }
        }
        if entry.operator > 0xFF {
            out.extend_from_slice(&entry.operator.to_be_bytes());
        } else {
            out.push(entry.operator as u8);
        }
    }
    out
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn write_int(out: &mut Vec<u8>, value: i32) {
    match value {
        -107..=107 => out.push((value + 139) as u8),
        108..=1131 => {
            let value = value - 108;
            out.extend_from_slice(&[(value >> 8) as u8 + 247, value as u8]);
        }
        -1131..=-108 => {
            let value = -value - 108;
            out.extend_from_slice(&[(value >> 8) as u8 + 251, value as u8]);
        }
        -32768..=32767 => {
            out.push(28);
            out.extend_from_slice(&(value as i16).to_be_bytes());
        }
        _ => {
            out.push(29);
            out.extend_from_slice(&value.to_be_bytes());
        }
    }
}

fn find(entries: &[DictEntry], operator: u16) -> Option<&DictEntry> {
    entries.iter().find(|entry| entry.operator == operator)
}

fn int_operand(entry: &DictEntry, index: usize) -> Result<i32> {
    match entry.operands.get(index) {
        Some(Operand::Int(value) | Operand::Offset(value)) => Ok(*value),
        _ => Err(ReadError::MalformedData("CFF DICT operand is not an integer").into()),
    }
}

fn to_offset(value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| ReadError::MalformedData("negative CFF offset").into())
}

/// The parts of a `CFF ` table that locate its CharStrings.
struct Layout {
    name_index: Index,
    top_dict_index: Index,
    top_dict: Vec<DictEntry>,
    char_strings: Index,
}

impl Layout {
    fn read(table: &[u8]) -> Result<Self> {
        let data = FontData::new(table);
        let header_size = usize::from(data.read_at::<u8>(2)?);
        let name_index = Index::read(data, header_size)?;
        let top_dict_index = Index::read(data, name_index.end)?;

        let [top_dict_range] = top_dict_index.entries.as_slice() else {
            return Err(Error::UnsupportedOutlines("CFF tables holding several fonts"));
        };
        let top_dict = parse_dict(&table[top_dict_range.clone()])?;
        if find(&top_dict, OP_ROS).is_some() {
            return Err(Error::UnsupportedOutlines("CID-keyed CFF outlines"));
        }

        let char_strings = find(&top_dict, OP_CHAR_STRINGS)
            .ok_or(ReadError::MalformedData("CFF Top DICT has no CharStrings"))?;
        let char_strings = Index::read(data, to_offset(int_operand(char_strings, 0)?)?)?;

        Ok(Layout { name_index, top_dict_index, top_dict, char_strings })
    }
}

/// Reads one charstring per glyph from a name-keyed `CFF ` table.
///
/// # Errors
///
/// Fails on malformed tables, on CID-keyed fonts, and if the number of
/// charstrings differs from `num_glyphs`.
pub(crate) fn read_charstrings(table: &[u8], num_glyphs: u16) -> Result<Vec<Vec<u8>>> {
    let layout = Layout::read(table)?;
    if layout.char_strings.entries.len() != usize::from(num_glyphs) {
        return Err(ReadError::MalformedData("CFF CharStrings count differs from maxp").into());
    }
    Ok(layout
        .char_strings
        .entries
        .iter()
        .map(|range| table[range.clone()].to_vec())
        .collect())
}

/// Rebuilds `table` with `charstrings` as its CharStrings INDEX.
///
/// The new INDEX is appended to the table and the old one removed. Every
/// offset in the Top DICT is rewritten as a 5-byte integer and moved along
/// with the data it points to; subroutines are left untouched.
///
/// # Errors
///
/// Fails if the table cannot be read back or an offset points into the
/// header or the INDEXes preceding the String INDEX.
pub(crate) fn replace_charstrings(table: &[u8], charstrings: &[&[u8]]) -> Result<Vec<u8>> {
    let layout = Layout::read(table)?;
    let tail_start = layout.top_dict_index.end;
    let old = layout.char_strings.start..layout.char_strings.end;
    if old.start < tail_start {
        return Err(ReadError::MalformedData("CFF CharStrings overlap the Top DICT").into());
    }

    let private = private_range(table, &layout.top_dict)?;
    // A Private DICT reaches its Subrs by a relative offset, which only
    // survives if the old CharStrings do not sit between them.
    let removed = match &private {
        Some((range, subrs)) if straddles(&old, range.start, range.start + subrs) => {
            old.end..old.end
        }
        _ => old.clone(),
    };

    let mut top_dict = layout.top_dict.clone();
    let mut relocated = Vec::new();
    for entry in &mut top_dict {
        let slot = match entry.operator {
            OP_CHARSET => Some((0, PREDEFINED_CHARSETS)),
            OP_ENCODING => Some((0, PREDEFINED_ENCODINGS)),
            OP_PRIVATE => Some((1, 0)),
            OP_CHAR_STRINGS => Some((0, 0)),
            _ => None,
        };
        let Some((index, predefined)) = slot else {
            continue;
        };
        let value = int_operand(entry, index)?;
        if value < predefined {
            continue;
        }
        entry.operands[index] = Operand::Offset(value);
        relocated.push((entry.operator, to_offset(value)?));
    }

    let prefix_len = layout.name_index.end;
    let new_top_dict_len = write_index(&[write_dict(&top_dict).as_slice()])?.len();
    let head_len = prefix_len + new_top_dict_len;

    let mut tail = table[tail_start..removed.start].to_vec();
    tail.extend_from_slice(&table[removed.end..]);
    let char_strings_offset = head_len + tail.len();

    let relocate = |offset: usize| -> Result<usize> {
        if offset < tail_start || (removed.start < offset && offset < removed.end) {
            return Err(ReadError::MalformedData("CFF offset points into moved data").into());
        }
        let moved = if offset >= removed.end { offset - removed.len() } else { offset };
        Ok(moved - tail_start + head_len)
    };

    for (operator, offset) in relocated {
        let new = if operator == OP_CHAR_STRINGS {
            char_strings_offset
        } else {
            relocate(offset)?
        };
        let new =
            i32::try_from(new).map_err(|_| ReadError::MalformedData("CFF table too large"))?;
        let entry = top_dict
            .iter_mut()
            .find(|entry| entry.operator == operator)
            .ok_or(ReadError::MalformedData("CFF Top DICT lost an operator"))?;
        let index = usize::from(operator == OP_PRIVATE);
        entry.operands[index] = Operand::Offset(new);
    }

    let mut out = table[..prefix_len].to_vec();
    out.extend(write_index(&[write_dict(&top_dict).as_slice()])?);
    out.extend(tail);
    out.extend(write_index(charstrings)?);
    Ok(out)
}

fn straddles(range: &Range<usize>, a: usize, b: usize) -> bool {
    let (low, high) = (a.min(b), a.max(b));
    low < range.end && high >= range.end || low <= range.start && high > range.start
}

/// The Private DICT's byte range and its Subrs offset, if it has either.
fn private_range(table: &[u8], top_dict: &[DictEntry]) -> Result<Option<(Range<usize>, usize)>> {
    let Some(entry) = find(top_dict, OP_PRIVATE) else {
        return Ok(None);
    };
    let size = to_offset(int_operand(entry, 0)?)?;
    let start = to_offset(int_operand(entry, 1)?)?;
    let dict = table.get(start..start + size).ok_or(ReadError::OutOfBounds)?;

    let subrs = match find(&parse_dict(dict)?, OP_SUBRS) {
        Some(subrs) => to_offset(int_operand(subrs, 0)?)?,
        None => 0,
    };
    Ok(Some((start..start + size, subrs)))
}
