//! The replacement decision for a newly offered artifact.

use std::cmp::Ordering;
use std::path::PathBuf;

use super::descriptor::{ArtifactDescriptor, ReleaseSource};

/// An artifact already present in the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Where the file lives.
    pub path: PathBuf,
    /// Descriptor parsed from its file name.
    pub descriptor: ArtifactDescriptor,
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing comparable is stored; keep the new artifact.
    StoreNew,
    /// Keep the new artifact, then delete these.
    StoreNewRemoveOld(Vec<StoredArtifact>),
    /// Something stored is at least as good; do not store the new artifact.
    SkipNew {
        /// The stored artifact that wins.
        kept: StoredArtifact,
    },
}

/// Compares two descriptors by rank.
///
/// Rank is resolution alone: the efficient-encoding variant of a resolution
/// ranks equal to the plain one.
#[must_use]
pub fn compare_rank(a: &ArtifactDescriptor, b: &ArtifactDescriptor) -> Ordering {
    a.tier.resolution.cmp(&b.tier.resolution)
}

/// Decides what to do with `new` given every stored artifact of the same title.
///
/// - nothing stored: [`Decision::StoreNew`]
/// - any stored artifact outranks `new`: [`Decision::SkipNew`]
/// - an equally ranked stored artifact has a disc source tag: [`Decision::SkipNew`]
/// - otherwise every stored artifact is superseded: [`Decision::StoreNewRemoveOld`]
///
/// An equally ranked stored artifact with a web tag or no tag at all is
/// replaced. Skips are checked across the whole set before anything is
/// marked for removal, so a skip never leaves a partially cleared library.
#[must_use]
pub fn decide(new: &ArtifactDescriptor, existing: &[StoredArtifact]) -> Decision {
    if existing.is_empty() {
        return Decision::StoreNew;
    }

    let winner = existing.iter().find(|old| match compare_rank(&old.descriptor, new) {
        Ordering::Greater => true,
        Ordering::Equal => old.descriptor.source == ReleaseSource::Theatrical,
        Ordering::Less => false,
    });

    match winner {
        Some(kept) => Decision::SkipNew { kept: kept.clone() },
        None => Decision::StoreNewRemoveOld(existing.to_vec()),
    }
}
