//! Store file naming.
//!
//! A tree built from `sample.gbk` with `k = 16`, `t = 102` lives in
//! `sample.gbk.btree.data.16.102`; the search side reads `k` and `t` back out
//! of that name.

use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

const MARKER: &str = ".btree.data";

/// Output path for the tree built from `gbk` with the given `k` and `t`.
pub fn btree_file_name<P: AsRef<Path>>(gbk: P, sequence_length: u32, degree: u32) -> PathBuf {
    let mut name = gbk.as_ref().as_os_str().to_owned();
    name.push(format!("{}.{}.{}", MARKER, sequence_length, degree));
    PathBuf::from(name)
}

/// Recover `(k, t)` from a name produced by [`btree_file_name`].
///
/// # Errors
/// `Error::InvalidConfig` if the name does not end in
/// `.btree.data.<k>.<t>`.
pub fn parse_btree_file_name<P: AsRef<Path>>(path: P) -> Result<(u32, u32)> {
    let path = path.as_ref();
    let invalid = || {
        Error::InvalidConfig(format!(
            "{} is not named <gbk>{}.<k>.<t>",
            path.display(),
            MARKER
        ))
    };

    let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
    let mut fields = name.rsplitn(3, '.');
    let degree = fields.next().and_then(|f| f.parse().ok()).ok_or_else(invalid)?;
    let length = fields.next().and_then(|f| f.parse().ok()).ok_or_else(invalid)?;
    match fields.next() {
        Some(rest) if rest.ends_with(MARKER) => Ok((length, degree)),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        assert_eq!(
            btree_file_name("data/sample.gbk", 16, 102),
            PathBuf::from("data/sample.gbk.btree.data.16.102")
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        let path = btree_file_name("/tmp/GenBank_Sample_Record.gbk", 7, 3);
        assert_eq!(parse_btree_file_name(&path).unwrap(), (7, 3));
    }

    #[test]
    fn test_parse_ignores_directories() {
        assert_eq!(
            parse_btree_file_name("dir.v2/x.gbk.btree.data.31.2").unwrap(),
            (31, 2)
        );
    }

    #[test]
    fn test_parse_rejects_other_names() {
        for bad in [
            "sample.gbk",
            "sample.gbk.btree.data.16",
            "sample.gbk.btree.data.x.4",
            "sample.gbk.btree.index.16.4",
            "16.4",
        ] {
            assert!(
                matches!(parse_btree_file_name(bad), Err(Error::InvalidConfig(_))),
                "{}",
                bad
            );
        }
    }
}
