//! Member directory: the read-only view of the external member registry.
//!
//! The graph never creates, edits or deletes members. It only needs to know
//! whether a member exists in a tenant, its gender (for `father`/`mother`),
//! and, for name linkage and tree assembly, the members of a tenant.

use std::collections::BTreeMap;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::{Gender, Member, MemberId, TenantId};
use crate::Result;

#[async_trait]
pub trait MemberDirectory: Send + Sync + 'static {
    /// Get a member by ID. Returns None if not found.
    async fn get(&self, id: MemberId) -> Result<Option<Member>>;

    /// All members of a tenant, in ascending id order.
    async fn members_in_tenant(&self, tenant: TenantId) -> Result<Vec<Member>>;

    async fn exists(&self, tenant: TenantId, id: MemberId) -> Result<bool> {
        Ok(self.get(id).await?.is_some_and(|m| m.tenant == tenant))
    }

    async fn gender(&self, id: MemberId) -> Result<Option<Gender>> {
        Ok(self.get(id).await?.map(|m| m.gender))
    }
}

/// In-memory member directory for embedding and tests.
#[derive(Default)]
pub struct MemoryMemberDirectory {
    members: RwLock<BTreeMap<MemberId, Member>>,
}

impl MemoryMemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a member after validating it.
    pub fn insert(&self, member: Member) -> Result<()> {
        member.validate()?;
        self.members.write().insert(member.id, member);
        Ok(())
    }

    /// Remove a member record. Callers should detach its edges first
    /// (see `EdgeStore::detach_member`).
    pub fn remove(&self, id: MemberId) -> Option<Member> {
        self.members.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }
}

#[async_trait]
impl MemberDirectory for MemoryMemberDirectory {
    async fn get(&self, id: MemberId) -> Result<Option<Member>> {
        Ok(self.members.read().get(&id).cloned())
    }

    async fn members_in_tenant(&self, tenant: TenantId) -> Result<Vec<Member>> {
        Ok(self
            .members
            .read()
            .values()
            .filter(|m| m.tenant == tenant)
            .cloned()
            .collect())
    }
}
