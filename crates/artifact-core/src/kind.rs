//! Artifact kind trait
//!
//! Defines the [`ArtifactKind`] trait: the compile-time registration of one
//! artifact kind (its full data type, its partial patch type, its name and
//! schema version). This is a sealed trait; the five built-in kinds live in
//! [`crate::kinds`].

use crate::validation::ValidationError;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Trait for artifact kinds
///
/// # Type Safety
/// - `Data` is the complete, validated value
/// - `Patch` is the partial value accumulated while streaming; every field is
///   optional and absent fields are skipped on the wire
/// - `merge` is an explicit top-level merge: present fields replace the
///   current value wholesale, nested lists and objects are never combined
///
/// # Example
/// ```rust,ignore
/// let mut current = ExecutionPlanKind::default_patch();
/// ExecutionPlanKind::merge(&mut current, ExecutionPlanPatch {
///     objective: Some("Book a flight".into()),
///     ..Default::default()
/// });
/// ```
pub trait ArtifactKind: Send + Sync + 'static + Debug + private::Sealed {
    /// Complete value of this kind
    type Data: Serialize
        + DeserializeOwned
        + JsonSchema
        + Clone
        + Debug
        + PartialEq
        + Send
        + Sync
        + 'static;

    /// Partial value of this kind
    type Patch: Serialize
        + DeserializeOwned
        + Clone
        + Debug
        + Default
        + PartialEq
        + Send
        + Sync
        + 'static
        + From<Self::Data>;

    /// Kind name, used as `metadata.type`
    ///
    /// Lowercase with underscores; stable across versions.
    const KIND: &'static str;

    /// Schema version stamped into metadata
    const VERSION: u32;

    /// Default partial value used by factories and new sessions
    fn default_patch() -> Self::Patch;

    /// Shallow merge `delta` into `current`
    fn merge(current: &mut Self::Patch, delta: Self::Patch);

    /// Invariants the JSON Schema cannot express
    ///
    /// Default implementation always succeeds.
    ///
    /// # Errors
    /// Returns error if the value violates a kind invariant
    fn check_invariants(_data: &Self::Data) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Sealed trait - prevents external implementations
///
/// Crate-public for testing but `#[doc(hidden)]` to discourage
/// external implementations.
#[doc(hidden)]
pub mod private {
    /// Sealed trait marker
    pub trait Sealed {}
}

/// Replace `slot` when `value` is present
#[inline]
pub fn replace_if_present<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Check a ratio field lies in `[0, 1]`
///
/// # Errors
/// Returns a single-violation error naming `path`
pub fn check_unit_interval(kind: &str, path: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::single(
            kind,
            path,
            format!("{value} is outside [0, 1]"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_if_present_keeps_existing_on_none() {
        let mut slot = Some(1);
        replace_if_present(&mut slot, None);
        assert_eq!(slot, Some(1));
        replace_if_present(&mut slot, Some(2));
        assert_eq!(slot, Some(2));
    }

    #[test]
    fn unit_interval_bounds() {
        assert!(check_unit_interval("k", "/p", 0.0).is_ok());
        assert!(check_unit_interval("k", "/p", 1.0).is_ok());
        assert!(check_unit_interval("k", "/p", 1.01).is_err());
        assert!(check_unit_interval("k", "/p", f64::NAN).is_err());
    }
}
