//! GenBank flat-file reader.
//!
//! Only the sequence data is of interest: everything between an `ORIGIN`
//! line and the next `//` terminator, with position numbers and whitespace
//! stripped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::common::Result;

/// Collect one lowercase sequence per `ORIGIN` ... `//` block.
///
/// A block left open at end of input is dropped.
pub fn parse_sequences<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut sequences = Vec::new();
    let mut current: Option<String> = None;

    for line in reader.lines() {
        let line = line?;
        if line.contains("ORIGIN") {
            current = Some(String::new());
        } else if line.contains("//") {
            if let Some(seq) = current.take() {
                sequences.push(seq);
            }
        } else if let Some(seq) = current.as_mut() {
            seq.extend(
                line.chars()
                    .filter(|c| !c.is_ascii_digit() && !c.is_whitespace())
                    .map(|c| c.to_ascii_lowercase()),
            );
        }
    }

    Ok(sequences)
}

/// Read and parse a `.gbk` file.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let file = File::open(path.as_ref())?;
    let sequences = parse_sequences(BufReader::new(file))?;
    tracing::debug!(
        path = %path.as_ref().display(),
        sequences = sequences.len(),
        "parsed gbk file"
    );
    Ok(sequences)
}
