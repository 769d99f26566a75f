//! Small TrueType and CFF fonts assembled table by table.

#![allow(dead_code)]

use write_fonts::{types::Tag, FontBuilder};

pub struct TestGlyph {
    pub name: &'static str,
    pub record: Vec<u8>,
    pub advance: u16,
    pub lsb: i16,
}

impl TestGlyph {
    pub fn new(name: &'static str, record: Vec<u8>, advance: u16) -> Self {
        Self { name, record, advance, lsb: 0 }
    }
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// A closed triangle with its top vertex at `height`.
pub fn triangle(height: i16) -> Vec<u8> {
    let mut out = Vec::new();
    push_i16(&mut out, 1);
    for value in [0, 0, 400, height] {
        push_i16(&mut out, value);
    }
    push_u16(&mut out, 2);
    push_u16(&mut out, 0);
    out.extend_from_slice(&[0x01, 0x01, 0x01]);
    for dx in [0, 400, -200] {
        push_i16(&mut out, dx);
    }
    for dy in [0, 0, height] {
        push_i16(&mut out, dy);
    }
    out
}

/// A composite referencing each glyph index in `components` at the origin.
pub fn composite(components: &[u16]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in [-1, 0, 0, 400, 700] {
        push_i16(&mut out, value);
    }
    for (position, &glyph) in components.iter().enumerate() {
        let more = if position + 1 < components.len() { 0x0020 } else { 0 };
        push_u16(&mut out, 0x0003 | more);
        push_u16(&mut out, glyph);
        push_i16(&mut out, 0);
        push_i16(&mut out, 0);
    }
    out
}

fn coverage(glyphs: &[u16]) -> Vec<u8> {
    let mut out = Vec::new();
    push_u16(&mut out, 1);
    push_u16(&mut out, glyphs.len() as u16);
    for &glyph in glyphs {
        push_u16(&mut out, glyph);
    }
    out
}

/// A lookup of `lookup_type` holding one subtable.
fn lookup(lookup_type: u16, subtable: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::new();
    push_u16(&mut out, lookup_type);
    push_u16(&mut out, 0);
    push_u16(&mut out, 1);
    push_u16(&mut out, 8);
    out.extend(subtable);
    out
}

/// A type 1 lookup mapping each covered glyph to the substitute at the
/// same position. `substitutes` may be shorter than `covered`.
pub fn single_subst(covered: &[u16], substitutes: &[u16]) -> Vec<u8> {
    let mut subtable = Vec::new();
    push_u16(&mut subtable, 2);
    push_u16(&mut subtable, 6 + 2 * substitutes.len() as u16);
    push_u16(&mut subtable, substitutes.len() as u16);
    for &glyph in substitutes {
        push_u16(&mut subtable, glyph);
    }
    subtable.extend(coverage(covered));
    lookup(1, subtable)
}

/// A type 1 lookup in delta format.
pub fn single_subst_delta(covered: &[u16], delta: i16) -> Vec<u8> {
    let mut subtable = Vec::new();
    push_u16(&mut subtable, 1);
    push_u16(&mut subtable, 6);
    push_i16(&mut subtable, delta);
    subtable.extend(coverage(covered));
    lookup(1, subtable)
}

/// A type 3 lookup offering `alternates` for `base`.
pub fn alternate_subst(base: u16, alternates: &[u16]) -> Vec<u8> {
    let mut subtable = Vec::new();
    push_u16(&mut subtable, 1);
    push_u16(&mut subtable, 8);
    push_u16(&mut subtable, 1);
    push_u16(&mut subtable, 14);
    subtable.extend(coverage(&[base]));
    push_u16(&mut subtable, alternates.len() as u16);
    for &glyph in alternates {
        push_u16(&mut subtable, glyph);
    }
    lookup(3, subtable)
}

/// A type 2 lookup replacing `base` with `sequence`.
pub fn multiple_subst(base: u16, sequence: &[u16]) -> Vec<u8> {
    let mut subtable = Vec::new();
    push_u16(&mut subtable, 1);
    push_u16(&mut subtable, 8);
    push_u16(&mut subtable, 1);
    push_u16(&mut subtable, 14);
    subtable.extend(coverage(&[base]));
    push_u16(&mut subtable, sequence.len() as u16);
    for &glyph in sequence {
        push_u16(&mut subtable, glyph);
    }
    lookup(2, subtable)
}

/// A type 4 lookup forming `ligature` from `components`.
pub fn ligature_subst(components: &[u16], ligature: u16) -> Vec<u8> {
    let mut subtable = Vec::new();
    push_u16(&mut subtable, 1);
    push_u16(&mut subtable, 8);
    push_u16(&mut subtable, 1);
    push_u16(&mut subtable, 14);
    subtable.extend(coverage(&components[..1]));
    push_u16(&mut subtable, 1);
    push_u16(&mut subtable, 4);
    push_u16(&mut subtable, ligature);
    push_u16(&mut subtable, components.len() as u16);
    for &glyph in &components[1..] {
        push_u16(&mut subtable, glyph);
    }
    lookup(4, subtable)
}

/// A type 7 lookup wrapping a type 1 delta subtable.
pub fn extension_single_subst(covered: &[u16], delta: i16) -> Vec<u8> {
    let mut wrapped = Vec::new();
    push_u16(&mut wrapped, 1);
    push_u16(&mut wrapped, 6);
    push_i16(&mut wrapped, delta);
    wrapped.extend(coverage(covered));

    let mut subtable = Vec::new();
    push_u16(&mut subtable, 1);
    push_u16(&mut subtable, 1);
    push_u32(&mut subtable, 8);
    subtable.extend(wrapped);
    lookup(7, subtable)
}

/// A language system enabling `features`, plus an optional required one.
pub struct LangSys {
    pub required: Option<u16>,
    pub features: Vec<u16>,
}

/// A script with its default and named language systems.
pub struct Script {
    pub tag: &'static [u8; 4],
    pub default: Option<LangSys>,
    pub languages: Vec<(&'static [u8; 4], LangSys)>,
}

fn lang_sys(lang_sys: &LangSys) -> Vec<u8> {
    let mut out = Vec::new();
    push_u16(&mut out, 0);
    push_u16(&mut out, lang_sys.required.unwrap_or(0xFFFF));
    push_u16(&mut out, lang_sys.features.len() as u16);
    for &index in &lang_sys.features {
        push_u16(&mut out, index);
    }
    out
}

fn script(script: &Script) -> Vec<u8> {
    let header_len = 4 + 6 * script.languages.len();
    let mut tables = Vec::new();
    let default_offset = match &script.default {
        Some(default) => {
            tables.extend(lang_sys(default));
            header_len as u16
        }
        None => 0,
    };

    let mut out = Vec::new();
    push_u16(&mut out, default_offset);
    push_u16(&mut out, script.languages.len() as u16);
    for (tag, language) in &script.languages {
        out.extend_from_slice(&tag[..]);
        push_u16(&mut out, (header_len + tables.len()) as u16);
        tables.extend(lang_sys(language));
    }
    out.extend(tables);
    out
}

/// A GSUB table with a single `DFLT` script whose default language system
/// enables every feature. Each feature lists indices into `lookups`.
pub fn gsub(features: &[(&[u8; 4], &[u16])], lookups: &[Vec<u8>]) -> Vec<u8> {
    let default = LangSys { required: None, features: (0..features.len() as u16).collect() };
    let scripts = [Script { tag: b"DFLT", default: Some(default), languages: Vec::new() }];
    gsub_with_scripts(&scripts, features, lookups)
}

/// A GSUB table with the given script list.
pub fn gsub_with_scripts(
    scripts: &[Script],
    features: &[(&[u8; 4], &[u16])],
    lookups: &[Vec<u8>],
) -> Vec<u8> {
    let mut script_list = Vec::new();
    let mut script_tables = Vec::new();
    push_u16(&mut script_list, scripts.len() as u16);
    let script_records_len = 2 + 6 * scripts.len();
    for entry in scripts {
        script_list.extend_from_slice(&entry.tag[..]);
        push_u16(&mut script_list, (script_records_len + script_tables.len()) as u16);
        script_tables.extend(script(entry));
    }
    script_list.extend(script_tables);

    let mut feature_list = Vec::new();
    let mut feature_tables = Vec::new();
    push_u16(&mut feature_list, features.len() as u16);
    let records_len = 2 + 6 * features.len();
    for (tag, lookup_indices) in features {
        feature_list.extend_from_slice(&tag[..]);
        push_u16(&mut feature_list, (records_len + feature_tables.len()) as u16);
        push_u16(&mut feature_tables, 0);
        push_u16(&mut feature_tables, lookup_indices.len() as u16);
        for &index in *lookup_indices {
            push_u16(&mut feature_tables, index);
        }
    }
    feature_list.extend(feature_tables);

    let mut lookup_list = Vec::new();
    let mut lookup_tables = Vec::new();
    push_u16(&mut lookup_list, lookups.len() as u16);
    let offsets_len = 2 + 2 * lookups.len();
    for table in lookups {
        push_u16(&mut lookup_list, (offsets_len + lookup_tables.len()) as u16);
        lookup_tables.extend_from_slice(table);
    }
    lookup_list.extend(lookup_tables);

    let mut out = Vec::new();
    push_u16(&mut out, 1);
    push_u16(&mut out, 0);
    push_u16(&mut out, 10);
    push_u16(&mut out, (10 + script_list.len()) as u16);
    push_u16(&mut out, (10 + script_list.len() + feature_list.len()) as u16);
    out.extend(script_list);
    out.extend(feature_list);
    out.extend(lookup_list);
    out
}

fn head(index_to_loc_format: i16) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000);
    push_u32(&mut out, 0x0001_0000);
    push_u32(&mut out, 0);
    push_u32(&mut out, 0x5F0F_3CF5);
    push_u16(&mut out, 0);
    push_u16(&mut out, 1000);
    out.extend_from_slice(&[0; 16]);
    for value in [0, 0, 400, 700] {
        push_i16(&mut out, value);
    }
    push_u16(&mut out, 0);
    push_u16(&mut out, 8);
    push_i16(&mut out, 2);
    push_i16(&mut out, index_to_loc_format);
    push_i16(&mut out, 0);
    out
}

fn hhea(number_of_h_metrics: u16, advance_width_max: u16) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000);
    push_i16(&mut out, 800);
    push_i16(&mut out, -200);
    push_i16(&mut out, 0);
    push_u16(&mut out, advance_width_max);
    for value in [0, 0, 400, 1, 0, 0, 0, 0, 0, 0, 0] {
        push_i16(&mut out, value);
    }
    push_u16(&mut out, number_of_h_metrics);
    out
}

fn maxp(num_glyphs: u16) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000);
    push_u16(&mut out, num_glyphs);
    for value in [3, 1, 3, 1, 2, 0, 0, 0, 0, 0, 0, 1, 1] {
        push_u16(&mut out, value);
    }
    out
}

fn post(names: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x0002_0000);
    out.extend_from_slice(&[0; 28]);
    push_u16(&mut out, names.len() as u16);

    let mut strings = Vec::new();
    let mut custom = 0;
    for name in names {
        if *name == ".notdef" {
            push_u16(&mut out, 0);
        } else {
            push_u16(&mut out, 258 + custom);
            custom += 1;
            strings.push(name.len() as u8);
            strings.extend_from_slice(name.as_bytes());
        }
    }
    out.extend(strings);
    out
}

/// Horizontal metrics with `long_metrics` full records; the remaining
/// glyphs only store their side bearing and share the last advance.
fn hmtx(glyphs: &[TestGlyph], long_metrics: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for (index, glyph) in glyphs.iter().enumerate() {
        if index < long_metrics {
            push_u16(&mut out, glyph.advance);
        }
        push_i16(&mut out, glyph.lsb);
    }
    out
}

/// How `build_font_with` lays out `loca` and `hmtx`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Layout {
    pub short_loca: bool,
    pub long_metrics: Option<u16>,
}

/// Builds a font file from `glyphs` (in glyph order), an optional GSUB
/// table, and any extra raw tables.
pub fn build_font(
    glyphs: &[TestGlyph],
    gsub: Option<Vec<u8>>,
    extra: &[(&[u8; 4], Vec<u8>)],
) -> Vec<u8> {
    build_font_with(glyphs, gsub, extra, Layout::default())
}

/// Like `build_font`, with control over the `loca` and `hmtx` layout.
pub fn build_font_with(
    glyphs: &[TestGlyph],
    gsub: Option<Vec<u8>>,
    extra: &[(&[u8; 4], Vec<u8>)],
    layout: Layout,
) -> Vec<u8> {
    let num_glyphs = glyphs.len() as u16;

    let mut glyf = Vec::new();
    let mut offsets = Vec::new();
    for glyph in glyphs {
        offsets.push(glyf.len());
        glyf.extend_from_slice(&glyph.record);
        while glyf.len() % 4 != 0 {
            glyf.push(0);
        }
    }
    offsets.push(glyf.len());

    let mut loca = Vec::new();
    for offset in offsets {
        if layout.short_loca {
            push_u16(&mut loca, (offset / 2) as u16);
        } else {
            push_u32(&mut loca, offset as u32);
        }
    }

    let mut builder = FontBuilder::new();
    builder
        .add_raw(Tag::new(b"head"), head(i16::from(!layout.short_loca)))
        .add_raw(Tag::new(b"maxp"), maxp(num_glyphs))
        .add_raw(Tag::new(b"loca"), loca)
        .add_raw(Tag::new(b"glyf"), glyf);
    add_common_tables(&mut builder, glyphs, layout.long_metrics, gsub, extra);
    builder.build()
}

fn add_common_tables(
    builder: &mut FontBuilder,
    glyphs: &[TestGlyph],
    long_metrics: Option<u16>,
    gsub: Option<Vec<u8>>,
    extra: &[(&[u8; 4], Vec<u8>)],
) {
    let long_metrics = long_metrics.unwrap_or(glyphs.len() as u16);
    let advance_width_max = glyphs.iter().map(|glyph| glyph.advance).max().unwrap_or(0);
    let names: Vec<&str> = glyphs.iter().map(|glyph| glyph.name).collect();

    builder
        .add_raw(Tag::new(b"hhea"), hhea(long_metrics, advance_width_max))
        .add_raw(Tag::new(b"hmtx"), hmtx(glyphs, usize::from(long_metrics)))
        .add_raw(Tag::new(b"post"), post(&names));
    if let Some(gsub) = gsub {
        builder.add_raw(Tag::new(b"GSUB"), gsub);
    }
    for (tag, data) in extra {
        builder.add_raw(Tag::new(tag), data.clone());
    }
}

/// A Type 2 charstring drawing nothing but a move to `(0, dy)`.
pub fn charstring(dy: i16) -> Vec<u8> {
    let mut out = vec![28];
    out.extend_from_slice(&dy.to_be_bytes());
    out.extend_from_slice(&[139, 21, 14]);
    out
}

fn cff_index(entries: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    push_u16(&mut out, entries.len() as u16);
    if entries.is_empty() {
        return out;
    }
    out.push(2);
    let mut offset = 1;
    push_u16(&mut out, offset);
    for entry in entries {
        offset += entry.len() as u16;
        push_u16(&mut out, offset);
    }
    for entry in entries {
        out.extend_from_slice(entry);
    }
    out
}

fn cff_offset(out: &mut Vec<u8>, value: usize) {
    out.push(29);
    push_u32(out, value as u32);
}

/// A name-keyed `CFF ` table holding each glyph's record as its charstring,
/// laid out as header, Name, Top DICT, String and Global Subr INDEXes,
/// charset, CharStrings, Private DICT and local Subrs. `cid` adds an `ROS`
/// operator to the Top DICT.
pub fn cff_table(glyphs: &[TestGlyph], cid: bool) -> Vec<u8> {
    let names = cff_index(&[b"Test".to_vec()]);
    let strings = cff_index(
        &glyphs[1..].iter().map(|glyph| glyph.name.as_bytes().to_vec()).collect::<Vec<_>>(),
    );
    let global_subrs = cff_index(&[]);
    let mut charset = vec![0];
    for sid in 0..glyphs.len() as u16 - 1 {
        push_u16(&mut charset, 391 + sid);
    }
    let char_strings =
        cff_index(&glyphs.iter().map(|glyph| glyph.record.clone()).collect::<Vec<_>>());
    let private = vec![141, 19];
    let subrs = cff_index(&[vec![11]]);

    // ROS, FontBBox, charset, CharStrings, Private
    let ros: &[u8] = if cid { &[140, 141, 139, 12, 30] } else { &[] };
    let top_dict_len = ros.len() + 13 + 6 + 6 + 11;
    let top_dict_index_len = 2 + 1 + 4 + top_dict_len;
    let charset_at = 4 + names.len() + top_dict_index_len + strings.len() + global_subrs.len();
    let char_strings_at = charset_at + charset.len();
    let private_at = char_strings_at + char_strings.len();

    let mut top_dict = ros.to_vec();
    for value in [0i16, -200, 500, 800] {
        top_dict.push(28);
        push_i16(&mut top_dict, value);
    }
    top_dict.push(5);
    cff_offset(&mut top_dict, charset_at);
    top_dict.push(15);
    cff_offset(&mut top_dict, char_strings_at);
    top_dict.push(17);
    cff_offset(&mut top_dict, private.len());
    cff_offset(&mut top_dict, private_at);
    top_dict.push(18);

    let mut out = vec![1, 0, 4, 2];
    out.extend(names);
    out.extend(cff_index(&[top_dict]));
    out.extend(strings);
    out.extend(global_subrs);
    out.extend(charset);
    out.extend(char_strings);
    out.extend(private);
    out.extend(subrs);
    out
}

/// Builds an OpenType font with CFF outlines; each glyph's record is its
/// charstring.
pub fn build_cff_font(glyphs: &[TestGlyph], gsub: Option<Vec<u8>>, cid: bool) -> Vec<u8> {
    let mut maxp = Vec::new();
    push_u32(&mut maxp, 0x0000_5000);
    push_u16(&mut maxp, glyphs.len() as u16);

    let mut builder = FontBuilder::new();
    builder
        .add_raw(Tag::new(b"head"), head(0))
        .add_raw(Tag::new(b"maxp"), maxp)
        .add_raw(Tag::new(b"CFF "), cff_table(glyphs, cid));
    add_common_tables(&mut builder, glyphs, None, gsub, &[]);
    builder.build()
}

/// The CFF counterpart of `glyphs`.
pub fn cff_glyphs() -> Vec<TestGlyph> {
    vec![
        TestGlyph::new(".notdef", charstring(0), 500),
        TestGlyph::new("a", charstring(500), 520),
        TestGlyph::new("a.ss01", charstring(550), 560),
        TestGlyph::new("g", charstring(600), 530),
        TestGlyph::new("g.ss02", charstring(650), 540),
    ]
}

/// `.notdef`, `a`, `a.ss01`, `g`, `g.ss02`, with distinct outlines and widths.
pub fn glyphs() -> Vec<TestGlyph> {
    vec![
        TestGlyph::new(".notdef", Vec::new(), 500),
        TestGlyph::new("a", triangle(500), 520),
        TestGlyph::new("a.ss01", triangle(550), 560),
        TestGlyph::new("g", triangle(600), 530),
        TestGlyph::new("g.ss02", triangle(650), 540),
    ]
}

/// A GSUB where `ss01` maps glyph 1 to 2 and `ss02` maps glyph 3 to 4.
pub fn stylistic_sets_gsub() -> Vec<u8> {
    gsub(
        &[(b"ss01", &[0]), (b"ss02", &[1])],
        &[single_subst(&[1], &[2]), single_subst_delta(&[3], 1)],
    )
}

/// A font where `ss01` maps `a` to `a.ss01` and `ss02` maps `g` to `g.ss02`.
pub fn stylistic_sets_font() -> Vec<u8> {
    build_font(&glyphs(), Some(stylistic_sets_gsub()), &[])
}
