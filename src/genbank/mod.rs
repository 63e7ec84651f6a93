//! GenBank input handling.
//!
//! These feed the B-tree but are not part of it:
//! - [`gbk`] - Pull raw sequences out of `.gbk` records
//! - [`sequence`] - 2-bit encoding of bases into `u64` keys
//! - [`aggregate`] - Count duplicate subsequences before insertion
//! - [`naming`] - `<gbk>.btree.data.<k>.<t>` file names

pub mod aggregate;
pub mod gbk;
pub mod naming;
pub mod sequence;
