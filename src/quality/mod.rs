//! Quality ranking and the replacement policy for stored artifacts.
//!
//! Release names are parsed into an [`ArtifactDescriptor`] (title, tier,
//! source), [`decide`] compares a new descriptor against what is already
//! stored for the same title, and a [`QualityLibrary`] finds and removes the
//! files involved.

mod descriptor;
mod library;
mod policy;

pub use descriptor::{ArtifactDescriptor, QualityTier, ReleaseSource, Resolution, normalize_title};
pub use library::{PARTIAL_SUFFIX, QualityLibrary};
pub use policy::{Decision, StoredArtifact, compare_rank, decide};
