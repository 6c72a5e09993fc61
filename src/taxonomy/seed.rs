//! System relationship types seeded at bootstrap.
//!
//! Every row is global (`tenant = None`) and system-defined. Sort orders
//! overlap on purpose: the specific types (`father`, `brother`, ...) sit
//! next to the legacy generic ones they refine.

use crate::model::{Category, RelationshipType};
use Category::{Extended, Immediate, NonFamily};

/// `(slug, label, category, inverse_slug, sort_order)`
type SeedRow = (&'static str, &'static str, Category, &'static str, i32);

const SYSTEM_TYPES: &[SeedRow] = &[
    // Legacy generic types
    ("parent", "Parent", Immediate, "child", 1),
    ("child", "Child", Immediate, "parent", 2),
    ("spouse", "Spouse", Immediate, "spouse", 3),
    ("sibling", "Sibling", Immediate, "sibling", 4),
    ("partner", "Partner", Immediate, "partner", 5),
    ("grandparent", "Grandparent", Extended, "grandchild", 10),
    ("grandchild", "Grandchild", Extended, "grandparent", 11),
    ("aunt_uncle", "Aunt/Uncle", Extended, "niece_nephew", 12),
    ("niece_nephew", "Niece/Nephew", Extended, "aunt_uncle", 13),
    ("cousin", "Cousin", Extended, "cousin", 14),
    ("in_law", "In-Law", Extended, "in_law", 15),
    ("step_parent", "Step-Parent", Extended, "step_child", 16),
    ("step_child", "Step-Child", Extended, "step_parent", 17),
    ("step_sibling", "Step-Sibling", Extended, "step_sibling", 18),
    ("half_sibling", "Half-Sibling", Extended, "half_sibling", 19),
    ("ex_spouse", "Ex-Spouse", Extended, "ex_spouse", 20),
    ("friend", "Friend", NonFamily, "friend", 30),
    ("godparent", "Godparent", NonFamily, "godchild", 31),
    ("godchild", "Godchild", NonFamily, "godparent", 32),
    // Specific parent / child
    ("father", "Father", Immediate, "child_of_father", 1),
    ("mother", "Mother", Immediate, "child_of_mother", 2),
    ("child_of_father", "Child", Immediate, "father", 3),
    ("child_of_mother", "Child", Immediate, "mother", 4),
    // Step parents
    ("stepfather", "Stepfather", Extended, "stepchild_of_father", 16),
    ("stepmother", "Stepmother", Extended, "stepchild_of_mother", 17),
    ("stepchild_of_father", "Stepchild", Extended, "stepfather", 18),
    ("stepchild_of_mother", "Stepchild", Extended, "stepmother", 19),
    // Brother / sister
    ("brother", "Brother", Immediate, "sibling_of_brother", 5),
    ("sister", "Sister", Immediate, "sibling_of_sister", 6),
    ("sibling_of_brother", "Sibling", Immediate, "brother", 7),
    ("sibling_of_sister", "Sibling", Immediate, "sister", 8),
    // Husband / wife
    ("husband", "Husband", Immediate, "wife", 9),
    ("wife", "Wife", Immediate, "husband", 10),
    // Grandparents
    ("grandfather", "Grandfather", Extended, "grandchild_of_gf", 21),
    ("grandmother", "Grandmother", Extended, "grandchild_of_gm", 22),
    ("grandchild_of_gf", "Grandchild", Extended, "grandfather", 23),
    ("grandchild_of_gm", "Grandchild", Extended, "grandmother", 24),
    // Aunts / uncles
    ("uncle", "Uncle", Extended, "niece_nephew_of_uncle", 25),
    ("aunt", "Aunt", Extended, "niece_nephew_of_aunt", 26),
    ("niece_nephew_of_uncle", "Niece/Nephew", Extended, "uncle", 27),
    ("niece_nephew_of_aunt", "Niece/Nephew", Extended, "aunt", 28),
];

/// The full system catalog, in seed order.
pub fn system_types() -> Vec<RelationshipType> {
    SYSTEM_TYPES
        .iter()
        .map(|&(slug, label, category, inverse, sort_order)| RelationshipType {
            slug: slug.to_string(),
            label: label.to_string(),
            category,
            inverse_slug: Some(inverse.to_string()),
            is_system: true,
            sort_order,
            tenant: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_slugs_are_unique() {
        let types = system_types();
        let mut seen = std::collections::HashSet::new();
        for t in &types {
            assert!(seen.insert(t.slug.as_str()), "duplicate seed slug {}", t.slug);
        }
    }

    #[test]
    fn test_every_inverse_resolves_and_points_back() {
        let types: HashMap<_, _> = system_types()
            .into_iter()
            .map(|t| (t.slug.clone(), t))
            .collect();

        for t in types.values() {
            let inverse = types
                .get(t.inverse())
                .unwrap_or_else(|| panic!("{} has dangling inverse {}", t.slug, t.inverse()));
            assert_eq!(inverse.inverse(), t.slug, "{} <-> {} is not an involution", t.slug, inverse.slug);
        }
    }

    #[test]
    fn test_symmetric_types() {
        let types = system_types();
        for slug in ["spouse", "sibling", "cousin", "friend"] {
            let t = types.iter().find(|t| t.slug == slug).unwrap();
            assert!(t.is_symmetric(), "{slug} should be self-inverse");
        }
        let father = types.iter().find(|t| t.slug == "father").unwrap();
        assert!(!father.is_symmetric());
    }
}
