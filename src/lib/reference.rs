//! Reference sequence dictionaries loaded from FASTA files.
//!
//! Text SAM input may carry no `@SQ` lines at all, in which case record reference
//! names cannot be resolved. A reference FASTA supplies the missing names and
//! lengths: the `.fai` index is used when present, otherwise the FASTA is read
//! sequentially and each record's sequence length is measured.

use crate::errors::VerifyError;
use crate::header::Reference;
use anyhow::{Context, Result};
use log::debug;
use noodles::fasta;
use noodles::fasta::fai;
use std::path::{Path, PathBuf};

/// Find FAI index path for a FASTA file.
fn find_fai_path(fasta_path: &Path) -> Option<PathBuf> {
    // Appending .fai to the full path is the samtools convention
    let fai_path = PathBuf::from(format!("{}.fai", fasta_path.display()));
    if fai_path.exists() {
        return Some(fai_path);
    }

    let fai_path = fasta_path.with_extension("fai");
    if fai_path.exists() {
        return Some(fai_path);
    }

    None
}

/// Loads the ordered list of reference sequences described by a FASTA file.
///
/// # Errors
/// Returns an error if the FASTA (or its index) cannot be read, or if it describes
/// an empty sequence.
pub fn load_references<P: AsRef<Path>>(path: P) -> Result<Vec<Reference>> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(VerifyError::InvalidFileFormat {
            file_type: "Reference FASTA".to_string(),
            path: path.display().to_string(),
            reason: "File does not exist".to_string(),
        }
        .into());
    }

    let references = if let Some(fai_path) = find_fai_path(path) {
        debug!("Reading reference dictionary from FAI index: {}", fai_path.display());
        load_from_fai(&fai_path)?
    } else {
        debug!("No FAI index found, scanning FASTA: {}", path.display());
        load_sequential(path)?
    };

    if let Some(empty) = references.iter().find(|r| r.length == 0) {
        return Err(VerifyError::InvalidFileFormat {
            file_type: "Reference FASTA".to_string(),
            path: path.display().to_string(),
            reason: format!("Reference '{}' has zero length", empty.name),
        }
        .into());
    }

    debug!("Loaded {} reference sequences", references.len());
    Ok(references)
}

fn load_from_fai(fai_path: &Path) -> Result<Vec<Reference>> {
    let index = fai::fs::read(fai_path)
        .with_context(|| format!("Failed to read FAI index: {}", fai_path.display()))?;
    let records: &[fai::Record] = index.as_ref();

    #[allow(clippy::cast_possible_truncation)]
    let references = records
        .iter()
        .map(|record| Reference {
            name: String::from_utf8_lossy(record.name().as_ref()).into_owned(),
            length: record.length() as usize,
        })
        .collect();

    Ok(references)
}

fn load_sequential(path: &Path) -> Result<Vec<Reference>> {
    let mut reader = fasta::io::reader::Builder
        .build_from_path(path)
        .with_context(|| format!("Failed to open reference FASTA: {}", path.display()))?;

    let mut references = Vec::new();
    for result in reader.records() {
        let record = result
            .with_context(|| format!("Failed to read reference FASTA: {}", path.display()))?;
        let name = String::from_utf8_lossy(record.name()).into_owned();
        references.push(Reference { name, length: record.sequence().len() });
    }

    Ok(references)
}
