//! Relationship Edge Store: the single mutation surface for edges.
//!
//! There is no API that writes or deletes one directional edge. Every
//! mutation handles a forward edge together with its inverse, inside one
//! storage transaction, while holding the lock for the member pair.
//!
//! Direction convention: `(from, slug, to)` reads "`to` is the `slug` of
//! `from`". `link(alice, bob, "father")` stores `(alice, father, bob)` and
//! `(bob, child_of_father, alice)`.

pub mod locks;

use std::collections::BTreeSet;
use chrono::Utc;

use crate::config::TypeDeletionPolicy;
use crate::members::MemberDirectory;
use crate::model::*;
use crate::registry::TypeRegistry;
use crate::storage::{complete_tx, StorageBackend};
use crate::tx::TxMode;
use crate::{Error, Result};

pub use locks::{PairGuard, PairLocks};

pub struct EdgeStore<'g, B: StorageBackend, D: MemberDirectory> {
    backend: &'g B,
    members: &'g D,
    locks: &'g PairLocks,
    registry: TypeRegistry<'g, B>,
}

impl<'g, B: StorageBackend, D: MemberDirectory> EdgeStore<'g, B, D> {
    pub fn new(
        backend: &'g B,
        members: &'g D,
        locks: &'g PairLocks,
        deletion: TypeDeletionPolicy,
    ) -> Self {
        Self { backend, members, locks, registry: TypeRegistry::new(backend, deletion) }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Record that `b` is the `slug` of `a`, together with the inverse fact.
    ///
    /// Idempotent: linking an existing pair returns it unchanged. A forward
    /// edge found without its inverse (legacy data) gets the inverse added.
    pub async fn link(&self, a: MemberId, b: MemberId, slug: &str) -> Result<EdgePair> {
        if a == b {
            return Err(Error::SelfEdge(a));
        }
        let tenant = self.shared_tenant(a, b).await?;

        let _pair = self.locks.acquire(a, b).await;
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = self.link_in(&mut tx, tenant, a, b, slug).await;
        complete_tx(self.backend, tx, result).await
    }

    async fn link_in(
        &self,
        tx: &mut B::Tx,
        tenant: TenantId,
        a: MemberId,
        b: MemberId,
        slug: &str,
    ) -> Result<EdgePair> {
        let ty = self.registry.resolve_in(tx, slug).await?;
        if !ty.available_to(tenant) {
            return Err(Error::TypeNotAvailable { slug: slug.to_string(), tenant });
        }
        let inverse_ty = self.registry.resolve_in(tx, ty.inverse()).await?;

        let forward_key = EdgeKey::new(a, b, ty.slug.clone());
        let inverse_key = forward_key.inverse(inverse_ty.slug.clone());
        let existing_forward = self.backend.get_edge(tx, &forward_key).await?;
        let existing_inverse = self.backend.get_edge(tx, &inverse_key).await?;

        match (&existing_forward, &existing_inverse) {
            (Some(_), Some(_)) => {
                tracing::debug!(tenant = %tenant, edge = %forward_key, "pair already linked");
            }
            (None, None) => {
                tracing::debug!(tenant = %tenant, edge = %forward_key, inverse = %inverse_key.slug, "linking pair");
            }
            _ => {
                tracing::warn!(tenant = %tenant, edge = %forward_key, inverse = %inverse_key.slug, "repairing half-linked pair");
            }
        }

        let now = Utc::now();
        let edge = match existing_forward {
            Some(edge) => edge,
            None => {
                let edge = RelationshipEdge::new(tenant, a, b, forward_key.slug, now);
                self.backend.insert_edge(tx, edge.clone()).await?;
                edge
            }
        };
        let inverse = match existing_inverse {
            Some(edge) => edge,
            None => {
                let edge = RelationshipEdge::new(tenant, b, a, inverse_key.slug, now);
                self.backend.insert_edge(tx, edge.clone()).await?;
                edge
            }
        };

        Ok(EdgePair { edge, inverse })
    }

    /// Remove the fact that `b` is the `slug` of `a`, and its inverse.
    ///
    /// Missing edges are not an error. Returns how many edges were deleted.
    /// Members need not exist any more, so this also cleans up after
    /// members removed from the directory.
    pub async fn unlink(&self, a: MemberId, b: MemberId, slug: &str) -> Result<usize> {
        if a == b {
            return Err(Error::SelfEdge(a));
        }

        let _pair = self.locks.acquire(a, b).await;
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = self.unlink_in(&mut tx, a, b, slug).await;
        complete_tx(self.backend, tx, result).await
    }

    async fn unlink_in(&self, tx: &mut B::Tx, a: MemberId, b: MemberId, slug: &str) -> Result<usize> {
        let ty = self.registry.resolve_in(tx, slug).await?;
        let forward_key = EdgeKey::new(a, b, ty.slug.clone());
        let inverse_key = forward_key.inverse(ty.inverse());

        let mut removed = 0;
        if self.backend.delete_edge(tx, &forward_key).await? {
            removed += 1;
        }
        if self.backend.delete_edge(tx, &inverse_key).await? {
            removed += 1;
        }
        tracing::debug!(edge = %forward_key, removed, "unlinked pair");
        Ok(removed)
    }

    /// Remove every pair touching `member`, in one transaction. Meant for
    /// the surrounding application to call before deleting the member.
    pub async fn detach_member(&self, member: MemberId) -> Result<usize> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = self.detach_in(&mut tx, member).await;
        let removed = complete_tx(self.backend, tx, result).await?;
        tracing::debug!(member = %member, removed, "detached member");
        Ok(removed)
    }

    async fn detach_in(&self, tx: &mut B::Tx, member: MemberId) -> Result<usize> {
        // Under pairing, outbound ∪ inbound holds both halves of every pair.
        let mut edges = self.backend.edges_from(tx, member).await?;
        edges.extend(self.backend.edges_to(tx, member).await?);

        let mut removed = 0;
        for edge in edges {
            if self.backend.delete_edge(tx, &edge.key()).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// `(slug, related)` for every edge leaving `member`.
    pub async fn edges_from(&self, member: MemberId) -> Result<BTreeSet<(String, MemberId)>> {
        let edges = self.outbound(member).await?;
        Ok(edges.into_iter().map(|e| (e.slug, e.to)).collect())
    }

    /// `(slug, related)` for every edge arriving at `member`. Under pairing
    /// this mirrors the inverse edges leaving `member`.
    pub async fn edges_to(&self, member: MemberId) -> Result<BTreeSet<(String, MemberId)>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let edges = self.backend.edges_to(&tx, member).await;
        let edges = complete_tx(self.backend, tx, edges).await?;
        Ok(edges.into_iter().map(|e| (e.slug, e.from)).collect())
    }

    /// Full outbound edge records, used by the query engine.
    pub async fn outbound(&self, member: MemberId) -> Result<Vec<RelationshipEdge>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let edges = self.backend.edges_from(&tx, member).await;
        complete_tx(self.backend, tx, edges).await
    }

    /// Every pair of a tenant listed once, by the half whose `from` is the
    /// smaller member id.
    pub async fn relationships_for_tenant(&self, tenant: TenantId) -> Result<Vec<RelationshipEdge>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let edges = self.backend.edges_for_tenant(&tx, tenant).await;
        let mut edges: Vec<_> = complete_tx(self.backend, tx, edges)
            .await?
            .into_iter()
            .filter(|e| e.from < e.to)
            .collect();
        edges.sort_by(|x, y| x.key().cmp(&y.key()));
        Ok(edges)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn shared_tenant(&self, a: MemberId, b: MemberId) -> Result<TenantId> {
        let from = self.members.get(a).await?.ok_or(Error::MemberNotFound(a))?;
        if self.members.exists(from.tenant, b).await? {
            return Ok(from.tenant);
        }
        match self.members.get(b).await? {
            Some(to) if to.tenant != from.tenant => Err(Error::CrossTenantEdge {
                from: a,
                from_tenant: from.tenant,
                to: b,
                to_tenant: to.tenant,
            }),
            _ => Err(Error::MemberNotFound(b)),
        }
    }
}
