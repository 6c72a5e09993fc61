//! Per-tenant family tree assembly.

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};

use crate::members::MemberDirectory;
use crate::model::*;
use crate::storage::StorageBackend;
use crate::taxonomy::KinClass;
use crate::Result;

use super::{select, RelationQuery};

/// One member with its immediate relatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub member: Member,
    pub parents: BTreeSet<Related>,
    pub children: BTreeSet<Related>,
    pub spouses: BTreeSet<Related>,
    pub siblings: BTreeSet<Related>,
    pub all_related: BTreeSet<Related>,
}

impl TreeNode {
    /// Members with no parent edge: the roots of a rendered tree.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

impl<B: StorageBackend, D: MemberDirectory> RelationQuery<'_, B, D> {
    /// Every member of `tenant`, ordered by first name then id.
    ///
    /// One outbound scan per member; the class sets are carved out of it.
    pub async fn family_tree(&self, tenant: TenantId) -> Result<Vec<TreeNode>> {
        let mut members = self.members.members_in_tenant(tenant).await?;
        members.sort_by(|a, b| a.first_name.cmp(&b.first_name).then(a.id.cmp(&b.id)));

        let mut nodes = Vec::with_capacity(members.len());
        for member in members {
            let edges = self.edges.outbound(member.id).await?;
            nodes.push(TreeNode {
                parents: select(&edges, &[KinClass::Parent, KinClass::StepParent]),
                children: select(&edges, &[KinClass::Child, KinClass::StepChild]),
                spouses: select(&edges, &[KinClass::Spouse]),
                siblings: select(&edges, &[KinClass::Sibling]),
                all_related: edges.iter().map(Related::from).collect(),
                member,
            });
        }
        tracing::debug!(tenant = %tenant, members = nodes.len(), "assembled family tree");
        Ok(nodes)
    }
}
