//! Maps a pull request number to a build that published the package artifact.

mod core;
mod filter;
mod sources;

pub use self::core::{BuildResolver, Resolution, ResolverSources, Strategy};
pub use sources::{ArtifactVerifier, BuildSource, CheckRunSource, CommitLister};
