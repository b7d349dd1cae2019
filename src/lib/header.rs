//! Reference-name normalization for SAM/BAM headers.
//!
//! Reference sequences named with a `chr` prefix (`chr1`, `chrX`, ...) are renamed to
//! their bare form (`1`, `X`, ...) both in the reference dictionary and in the header
//! text, so that downstream tools keyed on the bare names can consume the output.
//! When a header has no text at all it is regenerated from the reference dictionary.
//!
//! Normalization itself is pure: [`normalize`] takes an [`AlignmentHeader`] and
//! returns a new one. Conversion to and from `noodles` headers lives alongside it,
//! as do the helpers for adding a `@PG` record to the output header.

use crate::errors::{self, VerifyError};
use anyhow::{Context, Result};
use bstr::BString;
use noodles::sam::Header;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::program::tag;
use noodles::sam::header::record::value::map::{Program, ReferenceSequence};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::num::NonZeroUsize;

/// The literal prefix stripped from reference names.
pub const CHR_PREFIX: &str = "chr";

/// The header-text pattern whose `chr` is deleted.
const SN_CHR_PATTERN: &str = "SN:chr";

/// Program ID used for the `@PG` record added to output headers.
pub const PROGRAM_ID: &str = "bamverify";

/// One entry of the reference dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Reference sequence name.
    pub name: String,
    /// Declared reference sequence length.
    pub length: usize,
}

impl Reference {
    #[must_use]
    pub fn new(name: &str, length: usize) -> Self {
        Self { name: name.to_string(), length }
    }
}

/// How a reference's declared length is set after its `chr` prefix is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LengthPolicy {
    /// Set the length to the byte length of the new name.
    ///
    /// This reproduces the historical behavior of the tool exactly. It is almost
    /// certainly a defect, since the declared length stops describing the sequence,
    /// but downstream consumers may depend on it.
    #[default]
    NameLength,
    /// Keep the declared length unchanged.
    Preserve,
}

/// A reference dictionary plus the free-form header text.
///
/// The dictionary order defines the numeric reference IDs used by records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlignmentHeader {
    references: Vec<Reference>,
    text: Option<String>,
    text_len: usize,
}

impl AlignmentHeader {
    /// Creates a header, deriving the stored text length from `text`.
    ///
    /// The text length is the number of bytes in the text, with no terminator counted.
    #[must_use]
    pub fn new(references: Vec<Reference>, text: Option<String>) -> Self {
        let text_len = text.as_ref().map_or(0, String::len);
        Self { references, text, text_len }
    }

    /// Builds the model from a parsed `noodles` header.
    ///
    /// The text is the SAM serialization of the header; an empty serialization is
    /// treated as absent text.
    ///
    /// # Errors
    /// Returns an error if the header cannot be serialized.
    pub fn from_sam_header(header: &Header) -> Result<Self> {
        let references = header
            .reference_sequences()
            .iter()
            .map(|(name, map)| Reference {
                name: String::from_utf8_lossy(name.as_ref()).into_owned(),
                length: map.length().get(),
            })
            .collect();

        let mut writer = noodles::sam::io::Writer::new(Vec::new());
        writer.write_header(header).context("Failed to serialize SAM header")?;
        let text = String::from_utf8(writer.into_inner()).context("Header text is not UTF-8")?;
        let text = if text.is_empty() { None } else { Some(text) };

        Ok(Self::new(references, text))
    }

    /// Builds a `noodles` header from this model.
    ///
    /// `@HD`, `@RG`, `@PG` and `@CO` records come from the header text. `@SQ` records
    /// follow the reference dictionary: one per reference, in dictionary order, with
    /// the dictionary's name and length. Any other fields on a text `@SQ` line with
    /// the same name (e.g. `M5`, `AS`) are carried over.
    ///
    /// # Errors
    /// Returns an error if the text is not a valid SAM header or a reference has a
    /// zero length.
    pub fn to_sam_header(&self) -> Result<Header> {
        let parsed: Header = match self.text.as_deref() {
            Some(text) if !text.is_empty() => {
                text.parse().context("Failed to parse normalized header text")?
            }
            _ => Header::default(),
        };

        let mut builder = Header::builder();

        if let Some(hd) = parsed.header() {
            builder = builder.set_header(hd.clone());
        }

        for reference in &self.references {
            let length = NonZeroUsize::new(reference.length).ok_or_else(|| {
                VerifyError::InvalidParameter {
                    parameter: format!("@SQ {}", reference.name),
                    reason: "reference length must be greater than 0".to_string(),
                }
            })?;

            let mut map = Map::<ReferenceSequence>::new(length);
            if let Some(existing) = parsed.reference_sequences().get(reference.name.as_bytes()) {
                *map.other_fields_mut() = existing.other_fields().clone();
            }
            builder = builder.add_reference_sequence(reference.name.as_str(), map);
        }

        for (id, rg) in parsed.read_groups() {
            builder = builder.add_read_group(id.clone(), rg.clone());
        }

        for (id, pg) in parsed.programs().as_ref() {
            builder = builder.add_program(id.clone(), pg.clone());
        }

        for comment in parsed.comments() {
            builder = builder.add_comment(comment.clone());
        }

        Ok(builder.build())
    }

    /// The reference dictionary.
    #[must_use]
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// The header text, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// The stored text length in bytes.
    #[must_use]
    pub fn text_len(&self) -> usize {
        self.text_len
    }
}

/// A reference that was renamed during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// Result of [`normalize`].
#[derive(Debug, Clone)]
pub struct NormalizedHeader {
    /// The rewritten header.
    pub header: AlignmentHeader,
    /// Every reference rename applied, in dictionary order.
    pub renames: Vec<Rename>,
    /// Renames withheld because the new name already belongs to another reference.
    pub withheld: Vec<Rename>,
}

/// Strips the `chr` prefix from one reference, if it qualifies.
///
/// A reference qualifies when its name starts with `chr` followed by at least one
/// more character and its declared length exceeds 3. Returns `None` otherwise.
#[must_use]
pub fn strip_reference_prefix(reference: &Reference, policy: LengthPolicy) -> Option<Reference> {
    let stripped = reference.name.strip_prefix(CHR_PREFIX)?;
    if stripped.is_empty() || reference.length <= 3 {
        return None;
    }

    let length = match policy {
        LengthPolicy::NameLength => stripped.len(),
        LengthPolicy::Preserve => reference.length,
    };
    Some(Reference { name: stripped.to_string(), length })
}

/// Deletes the `chr` following every `SN:` in the header text.
///
/// Rescans after each deletion, so `SN:chrchr1` becomes `SN:1`.
#[must_use]
pub fn rewrite_header_text(text: &str) -> String {
    rewrite_header_text_keeping(text, &HashSet::new())
}

/// Like [`rewrite_header_text`], but leaves an `SN:` value untouched when the whole
/// value (up to the next tab or newline) is in `keep`.
#[must_use]
pub fn rewrite_header_text_keeping(text: &str, keep: &HashSet<&str>) -> String {
    let mut rewritten = text.to_string();
    let mut from = 0;
    while let Some(offset) = rewritten[from..].find(SN_CHR_PATTERN) {
        let pos = from + offset;
        let start = pos + SN_CHR_PATTERN.len() - CHR_PREFIX.len();
        let end = rewritten[start..].find(['\t', '\n']).map_or(rewritten.len(), |i| start + i);
        if keep.contains(&rewritten[start..end]) {
            from = end;
        } else {
            rewritten.replace_range(start..start + CHR_PREFIX.len(), "");
            // A deletion can complete a pattern that began just before it
            from = pos.saturating_sub(SN_CHR_PATTERN.len());
        }
    }
    rewritten
}

/// Generates header text with one `@SQ` line per reference, in order.
///
/// # Errors
/// Returns [`VerifyError::HeaderSynthesis`] if a line cannot be formatted.
pub fn synthesize_header_text(references: &[Reference]) -> errors::Result<String> {
    let mut text = String::new();
    for reference in references {
        writeln!(text, "@SQ\tSN:{}\tLN:{}", reference.name, reference.length)
            .map_err(|_| VerifyError::HeaderSynthesis { reference: reference.name.clone() })?;
    }
    Ok(text)
}

/// Normalizes reference names and header text.
///
/// 1. Strips the `chr` prefix from every qualifying reference (see
///    [`strip_reference_prefix`]), unless the stripped name already names another
///    reference. Such a reference keeps its name and is listed in
///    [`NormalizedHeader::withheld`].
/// 2. Deletes `chr` after every `SN:` in the header text, except on the `@SQ` lines
///    of withheld references.
/// 3. If the text is absent or empty and there are references, regenerates it from
///    the rewritten references.
///
/// # Errors
/// Returns an error if header text must be synthesized and formatting fails.
pub fn normalize(header: &AlignmentHeader, policy: LengthPolicy) -> errors::Result<NormalizedHeader> {
    let mut renames = Vec::new();
    let mut withheld = Vec::new();
    let mut references = Vec::with_capacity(header.references.len());
    let existing: HashSet<&str> = header.references.iter().map(|r| r.name.as_str()).collect();

    for reference in &header.references {
        match strip_reference_prefix(reference, policy) {
            Some(stripped) => {
                let rename = Rename { from: reference.name.clone(), to: stripped.name.clone() };
                if existing.contains(stripped.name.as_str()) {
                    withheld.push(rename);
                    references.push(reference.clone());
                } else {
                    renames.push(rename);
                    references.push(stripped);
                }
            }
            None => references.push(reference.clone()),
        }
    }

    let keep: HashSet<&str> = withheld.iter().map(|rename| rename.from.as_str()).collect();
    let text = header
        .text
        .as_deref()
        .map(|text| rewrite_header_text_keeping(text, &keep))
        .filter(|text| !text.is_empty());
    let text = match text {
        Some(text) => Some(text),
        None if !references.is_empty() => Some(synthesize_header_text(&references)?),
        None => None,
    };

    Ok(NormalizedHeader { header: AlignmentHeader::new(references, text), renames, withheld })
}

/// Get the ID of the last program in the @PG chain (for PP chaining).
///
/// Finds the program that is not referenced by any other program's PP tag,
/// i.e., the "leaf" of the chain.
#[must_use]
pub fn get_last_program_id(header: &Header) -> Option<String> {
    let programs = header.programs();
    let program_map = programs.as_ref();

    if program_map.is_empty() {
        return None;
    }

    let mut referenced: HashSet<&[u8]> = HashSet::new();
    for (_id, pg) in program_map {
        if let Some(pp) = pg.other_fields().get(&tag::PREVIOUS_PROGRAM_ID) {
            referenced.insert(pp.as_ref());
        }
    }

    for (id, _pg) in program_map {
        if !referenced.contains(id.as_slice()) {
            return Some(String::from_utf8_lossy(id).to_string());
        }
    }

    // A cycle of PP references; chain to any program
    program_map.keys().next().map(|id| String::from_utf8_lossy(id).to_string())
}

/// Create a unique program ID by appending .1, .2, etc. if needed.
#[must_use]
pub fn make_unique_program_id(header: &Header, base_id: &str) -> String {
    let programs = header.programs();
    let program_map = programs.as_ref();

    if !program_map.contains_key(base_id.as_bytes()) {
        return base_id.to_string();
    }

    (1..)
        .map(|i| format!("{base_id}.{i}"))
        .find(|candidate| !program_map.contains_key(candidate.as_bytes()))
        .unwrap_or_else(|| base_id.to_string())
}

/// Add a @PG record to an existing header with automatic PP chaining.
///
/// An empty `version` or `command_line` is left out of the record.
///
/// # Errors
///
/// Returns an error if the program record cannot be built or added to the header.
pub fn add_pg_record(mut header: Header, version: &str, command_line: &str) -> Result<Header> {
    let previous_program = get_last_program_id(&header);
    let unique_id = make_unique_program_id(&header, PROGRAM_ID);

    let mut builder = Map::<Program>::builder().insert(tag::NAME, PROGRAM_ID);
    // The BAM encoder rejects empty field values
    if !version.is_empty() {
        builder = builder.insert(tag::VERSION, version);
    }
    if !command_line.is_empty() {
        builder = builder.insert(tag::COMMAND_LINE, command_line);
    }
    if let Some(pp) = previous_program.as_deref() {
        builder = builder.insert(tag::PREVIOUS_PROGRAM_ID, pp);
    }

    header.programs_mut().add(BString::from(unique_id), builder.build()?)?;
    Ok(header)
}
