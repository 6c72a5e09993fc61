//! Relationship edge: a directed, typed fact between two members.
//!
//! An edge `(from, slug, to)` reads "`to` is the `slug` of `from`":
//! `(alice, "father", bob)` says Bob is Alice's father. Every edge is
//! stored together with its inverse, `(bob, "child_of_father", alice)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::{MemberId, TenantId};

/// Unique key of an edge: at most one edge per `(from, to, slug)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub from: MemberId,
    pub to: MemberId,
    pub slug: String,
}

impl EdgeKey {
    pub fn new(from: MemberId, to: MemberId, slug: impl Into<String>) -> Self {
        Self { from, to, slug: slug.into() }
    }

    /// Key of the paired edge for the given inverse slug.
    pub fn inverse(&self, inverse_slug: impl Into<String>) -> Self {
        Self { from: self.to, to: self.from, slug: inverse_slug.into() }
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})-[:{}]->({})", self.from, self.slug, self.to)
    }
}

/// A stored edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub from: MemberId,
    pub to: MemberId,
    pub slug: String,
    pub tenant: TenantId,
    pub created_at: DateTime<Utc>,
}

impl RelationshipEdge {
    pub fn new(
        tenant: TenantId,
        from: MemberId,
        to: MemberId,
        slug: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self { from, to, slug: slug.into(), tenant, created_at }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.from, self.to, self.slug.clone())
    }
}

/// The two halves written by a single `link`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgePair {
    pub edge: RelationshipEdge,
    pub inverse: RelationshipEdge,
}

/// One hit of a derived query: the related member and the specific slug
/// that put it in the result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Related {
    pub member: MemberId,
    pub slug: String,
}

impl Related {
    pub fn new(member: MemberId, slug: impl Into<String>) -> Self {
        Self { member, slug: slug.into() }
    }
}

impl From<&RelationshipEdge> for Related {
    fn from(edge: &RelationshipEdge) -> Self {
        Self { member: edge.to, slug: edge.slug.clone() }
    }
}
