//! Derived Relation Query Engine.
//!
//! Pure read layer: every answer is M's outbound edges filtered through the
//! static classification table in [`taxonomy`]. Nothing here follows more
//! than one hop.
//!
//! | Query | Outbound slugs kept | Extra filter |
//! |-------|---------------------|--------------|
//! | `father` | `FATHER_TYPES` | target gender is male |
//! | `mother` | `MOTHER_TYPES` | target gender is female |
//! | `parents` | Parent ∪ StepParent | |
//! | `children` | Child ∪ StepChild | |
//! | `step_parents` | StepParent | |
//! | `spouses` | Spouse | |
//! | `siblings` | Sibling | |
//! | `grandparents` | Grandparent | |
//! | `grandchildren` | Grandchild | |
//! | `all_related` | everything | |
//!
//! Because every Parent/StepParent slug has its inverse in Child/StepChild,
//! `y ∈ parents(x)` exactly when `x ∈ children(y)`.

pub mod tree;

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};

use crate::edges::EdgeStore;
use crate::members::MemberDirectory;
use crate::model::*;
use crate::storage::StorageBackend;
use crate::taxonomy::{self, KinClass};
use crate::Result;

pub use tree::TreeNode;

/// A named derived relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Father,
    Mother,
    Parents,
    Children,
    StepParents,
    Spouses,
    Siblings,
    Grandparents,
    Grandchildren,
    AllRelated,
}

impl Relation {
    /// Classes kept by the class-based relations; `None` for the gendered
    /// and unfiltered ones.
    pub fn classes(self) -> Option<&'static [KinClass]> {
        match self {
            Relation::Parents => Some(&[KinClass::Parent, KinClass::StepParent]),
            Relation::Children => Some(&[KinClass::Child, KinClass::StepChild]),
            Relation::StepParents => Some(&[KinClass::StepParent]),
            Relation::Spouses => Some(&[KinClass::Spouse]),
            Relation::Siblings => Some(&[KinClass::Sibling]),
            Relation::Grandparents => Some(&[KinClass::Grandparent]),
            Relation::Grandchildren => Some(&[KinClass::Grandchild]),
            Relation::Father | Relation::Mother | Relation::AllRelated => None,
        }
    }
}

pub struct RelationQuery<'g, B: StorageBackend, D: MemberDirectory> {
    edges: EdgeStore<'g, B, D>,
    members: &'g D,
}

impl<'g, B: StorageBackend, D: MemberDirectory> RelationQuery<'g, B, D> {
    pub fn new(edges: EdgeStore<'g, B, D>, members: &'g D) -> Self {
        Self { edges, members }
    }

    /// Dispatch a named relation.
    pub async fn relatives(&self, member: MemberId, relation: Relation) -> Result<BTreeSet<Related>> {
        match relation {
            Relation::Father => self.father(member).await,
            Relation::Mother => self.mother(member).await,
            Relation::AllRelated => self.all_related(member).await,
            other => {
                let classes = other.classes().unwrap_or(&[]);
                self.by_class(member, classes).await
            }
        }
    }

    /// Fathers: father-typed targets whose gender is male. A correctly
    /// typed edge to a member with unspecified gender yields nothing.
    pub async fn father(&self, member: MemberId) -> Result<BTreeSet<Related>> {
        self.gendered(member, taxonomy::FATHER_TYPES, Gender::Male).await
    }

    pub async fn mother(&self, member: MemberId) -> Result<BTreeSet<Related>> {
        self.gendered(member, taxonomy::MOTHER_TYPES, Gender::Female).await
    }

    /// Parents and step-parents, any gender.
    pub async fn parents(&self, member: MemberId) -> Result<BTreeSet<Related>> {
        self.relatives(member, Relation::Parents).await
    }

    pub async fn children(&self, member: MemberId) -> Result<BTreeSet<Related>> {
        self.relatives(member, Relation::Children).await
    }

    pub async fn step_parents(&self, member: MemberId) -> Result<BTreeSet<Related>> {
        self.relatives(member, Relation::StepParents).await
    }

    pub async fn spouses(&self, member: MemberId) -> Result<BTreeSet<Related>> {
        self.relatives(member, Relation::Spouses).await
    }

    pub async fn siblings(&self, member: MemberId) -> Result<BTreeSet<Related>> {
        self.relatives(member, Relation::Siblings).await
    }

    pub async fn grandparents(&self, member: MemberId) -> Result<BTreeSet<Related>> {
        self.relatives(member, Relation::Grandparents).await
    }

    pub async fn grandchildren(&self, member: MemberId) -> Result<BTreeSet<Related>> {
        self.relatives(member, Relation::Grandchildren).await
    }

    /// Every outbound edge, whatever its type.
    pub async fn all_related(&self, member: MemberId) -> Result<BTreeSet<Related>> {
        let edges = self.edges.outbound(member).await?;
        Ok(edges.iter().map(Related::from).collect())
    }

    async fn by_class(&self, member: MemberId, classes: &[KinClass]) -> Result<BTreeSet<Related>> {
        let edges = self.edges.outbound(member).await?;
        Ok(select(&edges, classes))
    }

    async fn gendered(
        &self,
        member: MemberId,
        slugs: &[&str],
        gender: Gender,
    ) -> Result<BTreeSet<Related>> {
        let mut found = BTreeSet::new();
        for edge in self.edges.outbound(member).await? {
            if !slugs.contains(&edge.slug.as_str()) {
                continue;
            }
            if self.members.gender(edge.to).await? == Some(gender) {
                found.insert(Related::from(&edge));
            }
        }
        Ok(found)
    }
}

/// Keep the edges whose slug falls in one of `classes`.
pub(crate) fn select(edges: &[RelationshipEdge], classes: &[KinClass]) -> BTreeSet<Related> {
    edges
        .iter()
        .filter(|e| taxonomy::is_in(&e.slug, classes))
        .map(Related::from)
        .collect()
}
