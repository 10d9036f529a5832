//! Type resolution
//!
//! Expands generic read/write requests into the native identifier sets that
//! actually need authorization or querying: composite families fan out to all
//! registered members, derived types append their counterpart identifier, and
//! characteristics are silently excluded (always readable, never writable).
//!
//! Resolution is all-or-nothing: one unknown name fails the whole batch and
//! no partial result is returned.

use crate::error::BridgeError;
use crate::registry::{idents, TypeRegistry};
use crate::types::AccessScope;

/// Native identifier lists produced by resolution, each duplicate-free with
/// first-occurrence order preserved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTypes {
    pub read: Vec<String>,
    pub write: Vec<String>,
}

impl ResolvedTypes {
    /// Union of read and write identifiers, deduplicated
    pub fn combined(&self) -> Vec<String> {
        dedupe(self.read.iter().chain(self.write.iter()).cloned().collect())
    }
}

/// Resolver over an immutable registry
pub struct TypeResolver<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> TypeResolver<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a batch of access scopes into read and write identifier lists
    pub fn resolve(&self, scopes: &[AccessScope]) -> Result<ResolvedTypes, BridgeError> {
        let mut read = Vec::new();
        let mut write = Vec::new();

        for scope in scopes {
            match scope {
                AccessScope::Name(name) => {
                    let natives = self.native_types(std::slice::from_ref(name))?;
                    read.extend(natives.iter().cloned());
                    write.extend(natives);
                }
                AccessScope::ReadWrite { read: r, write: w } => {
                    read.extend(self.native_types(r)?);
                    write.extend(self.native_types(w)?);
                }
            }
        }

        Ok(ResolvedTypes {
            read: dedupe(read),
            write: dedupe(write),
        })
    }

    /// Expand generic names into native identifiers.
    ///
    /// Fails on the first unrecognized name, identifying it.
    fn native_types(&self, names: &[String]) -> Result<Vec<String>, BridgeError> {
        let mut natives = Vec::new();

        for name in names {
            match name.as_str() {
                // Characteristics are readable without authorization and
                // never writable, so they are excluded here.
                "gender" | "date_of_birth" => {}
                "nutrition" => {
                    for member in self.registry.family_members("nutrition.") {
                        natives.push(member.primary_native().to_string());
                    }
                }
                "blood_pressure" => {
                    natives.push(idents::BP_SYSTOLIC.to_string());
                    natives.push(idents::BP_DIASTOLIC.to_string());
                }
                other => match self.registry.descriptor(other) {
                    Some(descriptor) => {
                        natives.push(descriptor.primary_native().to_string());
                        if let Some(counterpart) = descriptor.derived_counterpart {
                            natives.push(counterpart.to_string());
                        }
                    }
                    None => return Err(BridgeError::UnknownDataType(other.to_string())),
                },
            }
        }

        Ok(natives)
    }
}

/// Shallow removal of duplicates, keeping the first occurrence
fn dedupe(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolve(scopes: &[AccessScope]) -> Result<ResolvedTypes, BridgeError> {
        let registry = TypeRegistry::new();
        TypeResolver::new(&registry).resolve(scopes)
    }

    #[test]
    fn distance_expands_to_walking_and_cycling() {
        let resolved = resolve(&["distance".into()]).unwrap();
        assert_eq!(
            resolved.read,
            vec![
                "HKQuantityTypeIdentifierDistanceWalkingRunning".to_string(),
                idents::DISTANCE_CYCLING.to_string(),
            ]
        );
        assert_eq!(resolved.read, resolved.write);
    }

    #[test]
    fn nutrition_expands_to_every_registered_nutrient() {
        let registry = TypeRegistry::new();
        let expected: Vec<String> = registry
            .family_members("nutrition.")
            .map(|d| d.primary_native().to_string())
            .collect();

        let resolved = resolve(&["nutrition".into()]).unwrap();
        assert_eq!(resolved.read, expected);
        assert!(resolved.read.len() >= 15);
    }

    #[test]
    fn blood_pressure_expands_to_both_quantity_identifiers() {
        let resolved = resolve(&["blood_pressure".into()]).unwrap();
        assert_eq!(
            resolved.read,
            vec![idents::BP_SYSTOLIC.to_string(), idents::BP_DIASTOLIC.to_string()]
        );
    }

    #[test]
    fn characteristics_are_silently_excluded() {
        let resolved = resolve(&["gender".into(), "date_of_birth".into(), "steps".into()]).unwrap();
        assert_eq!(resolved.read, vec!["HKQuantityTypeIdentifierStepCount".to_string()]);
    }

    #[test]
    fn split_read_write_scopes_resolve_independently() {
        let scopes = vec![AccessScope::ReadWrite {
            read: vec!["distance".to_string()],
            write: vec!["steps".to_string()],
        }];
        let resolved = resolve(&scopes).unwrap();
        assert_eq!(
            resolved.read,
            vec![
                "HKQuantityTypeIdentifierDistanceWalkingRunning".to_string(),
                idents::DISTANCE_CYCLING.to_string(),
            ]
        );
        assert_eq!(resolved.write, vec!["HKQuantityTypeIdentifierStepCount".to_string()]);
    }

    #[test]
    fn unknown_name_fails_the_whole_batch() {
        let err = resolve(&["steps".into(), "midichlorians".into()]).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::UnknownDataType(ref name) if name == "midichlorians"
        ));
    }

    #[test]
    fn resolution_deduplicates_preserving_first_occurrence() {
        let resolved =
            resolve(&["calories".into(), "calories.basal".into(), "calories".into()]).unwrap();
        assert_eq!(
            resolved.read,
            vec![
                "HKQuantityTypeIdentifierActiveEnergyBurned".to_string(),
                idents::BASAL_ENERGY.to_string(),
            ]
        );
    }
}
