//! Relationship type: one entry of the kinship taxonomy.

use serde::{Deserialize, Serialize};
use super::TenantId;

/// Display grouping for relationship types.
///
/// This is presentation only; derived queries use
/// [`KinClass`](crate::taxonomy::KinClass) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Immediate,
    Extended,
    NonFamily,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Immediate, Category::Extended, Category::NonFamily];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Immediate => "immediate",
            Category::Extended => "extended",
            Category::NonFamily => "non_family",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog entry, keyed by its globally unique slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipType {
    pub slug: String,
    pub label: String,
    pub category: Category,
    pub inverse_slug: Option<String>,
    pub is_system: bool,
    pub sort_order: i32,
    /// `None` for global types available to every tenant.
    pub tenant: Option<TenantId>,
}

impl RelationshipType {
    /// True when the inverse slug names this type itself (spouse, sibling, ...).
    pub fn is_symmetric(&self) -> bool {
        self.inverse_slug.as_deref() == Some(self.slug.as_str())
    }

    /// The slug of the inverse type. A missing inverse means the type is
    /// its own inverse.
    pub fn inverse(&self) -> &str {
        self.inverse_slug.as_deref().unwrap_or(&self.slug)
    }

    /// Whether members of `tenant` may use this type.
    pub fn available_to(&self, tenant: TenantId) -> bool {
        self.tenant.is_none_or(|owner| owner == tenant)
    }

    pub fn summary(&self) -> TypeSummary {
        TypeSummary { slug: self.slug.clone(), label: self.label.clone() }
    }
}

/// Request to add a tenant-private relationship type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRelationshipType {
    pub slug: String,
    pub label: String,
    pub category: Category,
    #[serde(default)]
    pub inverse_slug: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl NewRelationshipType {
    pub fn new(slug: impl Into<String>, label: impl Into<String>, category: Category) -> Self {
        Self {
            slug: slug.into(),
            label: label.into(),
            category,
            inverse_slug: None,
            sort_order: 0,
        }
    }

    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse_slug = Some(inverse.into());
        self
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }
}

/// Category-grouped projection: only what a picker needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSummary {
    pub slug: String,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display_matches_wire_name() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{category}\""));
        }
        assert_eq!(Category::NonFamily.to_string(), "non_family");
    }
}
