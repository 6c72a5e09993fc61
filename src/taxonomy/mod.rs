//! # Kinship Taxonomy
//!
//! Two compiled-in tables, versioned together:
//!
//! | Table | Module | Purpose |
//! |-------|--------|---------|
//! | System catalog | `seed` | Global relationship types inserted at bootstrap |
//! | Classification | here | slug → zero-or-one [`KinClass`] for derived queries |
//!
//! Class membership is NOT a field of [`RelationshipType`](crate::RelationshipType).
//! Adding a new label to an existing class (say, another step-parent type)
//! means adding a seed row AND a line to [`classify`], then bumping
//! [`TAXONOMY_VERSION`].
//!
//! All classes are read in the edge direction convention: the slug on an
//! outbound edge of M names what the target is to M.

pub mod seed;

use serde::{Deserialize, Serialize};

pub use seed::system_types;

/// Bumped whenever the seed catalog or the classification table changes.
pub const TAXONOMY_VERSION: u32 = 2;

/// Classification tags used by the derived relation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KinClass {
    Parent,
    Child,
    StepParent,
    StepChild,
    Spouse,
    Sibling,
    Grandparent,
    Grandchild,
}

impl KinClass {
    pub const ALL: [KinClass; 8] = [
        KinClass::Parent,
        KinClass::Child,
        KinClass::StepParent,
        KinClass::StepChild,
        KinClass::Spouse,
        KinClass::Sibling,
        KinClass::Grandparent,
        KinClass::Grandchild,
    ];

    /// The class an inverse slug must belong to.
    pub fn dual(self) -> KinClass {
        match self {
            KinClass::Parent => KinClass::Child,
            KinClass::Child => KinClass::Parent,
            KinClass::StepParent => KinClass::StepChild,
            KinClass::StepChild => KinClass::StepParent,
            KinClass::Grandparent => KinClass::Grandchild,
            KinClass::Grandchild => KinClass::Grandparent,
            KinClass::Spouse => KinClass::Spouse,
            KinClass::Sibling => KinClass::Sibling,
        }
    }

    /// Every slug tagged with this class.
    pub fn slugs(self) -> &'static [&'static str] {
        match self {
            KinClass::Parent => PARENT_TYPES,
            KinClass::Child => CHILD_TYPES,
            KinClass::StepParent => STEP_PARENT_TYPES,
            KinClass::StepChild => STEP_CHILD_TYPES,
            KinClass::Spouse => SPOUSE_TYPES,
            KinClass::Sibling => SIBLING_TYPES,
            KinClass::Grandparent => GRANDPARENT_TYPES,
            KinClass::Grandchild => GRANDCHILD_TYPES,
        }
    }
}

pub const PARENT_TYPES: &[&str] = &["father", "mother", "parent"];
pub const CHILD_TYPES: &[&str] = &["child_of_father", "child_of_mother", "child"];
pub const STEP_PARENT_TYPES: &[&str] = &["stepfather", "stepmother", "step_parent"];
pub const STEP_CHILD_TYPES: &[&str] = &["stepchild_of_father", "stepchild_of_mother", "step_child"];
pub const SPOUSE_TYPES: &[&str] = &["husband", "wife", "spouse"];
pub const SIBLING_TYPES: &[&str] = &["brother", "sister", "sibling", "sibling_of_brother", "sibling_of_sister"];
pub const GRANDPARENT_TYPES: &[&str] = &["grandfather", "grandmother", "grandparent"];
pub const GRANDCHILD_TYPES: &[&str] = &["grandchild_of_gf", "grandchild_of_gm", "grandchild"];

/// Parent slugs that name a father once the target is male. `parent` is
/// the legacy catch-all and counts for both.
pub const FATHER_TYPES: &[&str] = &["father", "parent"];
pub const MOTHER_TYPES: &[&str] = &["mother", "parent"];

/// Classify a slug. Unclassified slugs (cousin, friend, tenant additions)
/// still show up in `all_related`.
pub fn classify(slug: &str) -> Option<KinClass> {
    KinClass::ALL.into_iter().find(|class| class.slugs().contains(&slug))
}

pub fn is_in(slug: &str, classes: &[KinClass]) -> bool {
    classify(slug).is_some_and(|c| classes.contains(&c))
}

/// A classified slug whose inverse falls outside the dual class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationMismatch {
    pub slug: String,
    pub class: KinClass,
    pub inverse: String,
    pub inverse_class: Option<KinClass>,
}

/// Check that every classified system slug pairs with a slug of the dual
/// class. This is what keeps `parents` and `children` mirror images.
pub fn verify_classification() -> Vec<ClassificationMismatch> {
    verify_types(&system_types())
}

pub(crate) fn verify_types(types: &[crate::RelationshipType]) -> Vec<ClassificationMismatch> {
    let mut mismatches = Vec::new();
    for ty in types {
        let Some(class) = classify(&ty.slug) else { continue };
        let inverse_class = classify(ty.inverse());
        if inverse_class != Some(class.dual()) {
            mismatches.push(ClassificationMismatch {
                slug: ty.slug.clone(),
                class,
                inverse: ty.inverse().to_string(),
                inverse_class,
            });
        }
    }
    mismatches
}
