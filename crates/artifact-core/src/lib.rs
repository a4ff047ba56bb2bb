//! Artifact Core
//!
//! Typed artifact kinds, their descriptors, and schema validation.
//!
//! # Core Concepts
//!
//! - [`ArtifactKind`]: Trait registering one kind (full data type, patch type, name, version)
//! - [`Descriptor<K>`]: Runtime registration: compiled schema, defaults, factory, parser
//! - [`ArtifactData<K>`]: Artifact content with `validate`/`merge`/`serialize` behavior
//! - [`ArtifactEnvelope`]: Plain `{metadata, data}` wire shape
//! - [`ArtifactRegistry`]: Kind-name lookup and runtime dispatch
//!
//! # Example
//!
//! ```rust,ignore
//! use artifact_core::{Descriptor, kinds::{ExecutionPlanKind, ExecutionPlanPatch}};
//!
//! let plans = Descriptor::<ExecutionPlanKind>::define()?;
//! let plan = plans.create(Some(ExecutionPlanPatch {
//!     objective: Some("Compare prices".into()),
//!     ..Default::default()
//! }));
//!
//! let json = plan.serialize()?;
//! let restored = plans.parse(&json)?;
//! assert_eq!(restored.data(), plan.data());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod data;
mod descriptor;
mod error;
mod fingerprint;
mod kind;
mod metadata;
mod registry;
mod validation;

/// Built-in artifact kinds
pub mod kinds;

// Re-exports
pub use data::{ArtifactData, ArtifactEnvelope};
pub use descriptor::Descriptor;
pub use error::ArtifactError;
pub use fingerprint::{Fingerprint, FingerprintError};
pub use kind::{check_unit_interval, replace_if_present, ArtifactKind};
pub use metadata::{
    now_ms, ArtifactId, ArtifactMetadata, ArtifactStatus, IllegalTransition, MetadataPatch,
};
pub use registry::{AnyArtifact, ArtifactRegistry, KindInfo, RegistryError};
pub use validation::{SchemaValidator, ValidationError, Violation};

/// Sealed trait support.
/// **Note:** This is only for internal/testing use and may change.
#[doc(hidden)]
pub mod __private {
    pub use super::kind::private::Sealed;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
