//! # Storage Backend Trait
//!
//! This is THE contract between the relationship engine and any record store.
//! The engine only needs two keyed tables:
//!
//! | Table | Key | Constraint |
//! |-------|-----|------------|
//! | relationship types | `slug` | unique slug |
//! | relationship edges | `(from, to, slug)` | unique triple, secondary index on `from` |
//!
//! plus transactions whose writes become visible all at once on commit.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory for testing/embedding |

pub mod memory;

use async_trait::async_trait;
use crate::model::*;
use crate::tx::{Transaction, TxMode};
use crate::Result;

pub use memory::MemoryBackend;

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The universal storage contract.
///
/// Reads take the transaction so that a backend can serve a transaction's
/// own staged writes back to it. Writes on a `ReadOnly` transaction must
/// fail with `Error::TxError`.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// The transaction type for this backend.
    type Tx: Transaction;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Shut down the backend, flushing any pending writes.
    async fn shutdown(&self) -> Result<()>;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a new transaction.
    async fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit a transaction. Either every staged write becomes visible or
    /// none does.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a transaction, discarding its staged writes.
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Relationship types
    // ========================================================================

    /// Get a type by slug. Returns None if not found.
    async fn get_type(&self, tx: &Self::Tx, slug: &str) -> Result<Option<RelationshipType>>;

    /// All types, global and tenant-private, in no particular order.
    async fn all_types(&self, tx: &Self::Tx) -> Result<Vec<RelationshipType>>;

    /// Insert a type. Fails with `Error::DuplicateSlug` if the slug is taken.
    async fn insert_type(&self, tx: &mut Self::Tx, ty: RelationshipType) -> Result<()>;

    /// Delete a type. Returns true if it existed.
    async fn delete_type(&self, tx: &mut Self::Tx, slug: &str) -> Result<bool>;

    // ========================================================================
    // Edges
    // ========================================================================

    /// Get an edge by its unique key.
    async fn get_edge(&self, tx: &Self::Tx, key: &EdgeKey) -> Result<Option<RelationshipEdge>>;

    /// Insert an edge. Returns false (and changes nothing) if an edge with
    /// the same key already exists.
    async fn insert_edge(&self, tx: &mut Self::Tx, edge: RelationshipEdge) -> Result<bool>;

    /// Delete an edge. Returns true if it existed.
    async fn delete_edge(&self, tx: &mut Self::Tx, key: &EdgeKey) -> Result<bool>;

    /// Edges whose `from` is `member` (index-backed).
    async fn edges_from(&self, tx: &Self::Tx, member: MemberId) -> Result<Vec<RelationshipEdge>>;

    /// Edges whose `to` is `member`.
    async fn edges_to(&self, tx: &Self::Tx, member: MemberId) -> Result<Vec<RelationshipEdge>>;

    /// Every edge owned by a tenant.
    async fn edges_for_tenant(&self, tx: &Self::Tx, tenant: TenantId) -> Result<Vec<RelationshipEdge>>;

    /// Edges of one type within a tenant.
    ///
    /// Default: scans the tenant's edges. A tenant-private type can only be
    /// referenced from inside its tenant, so this is enough for in-use checks.
    async fn edges_by_type(
        &self,
        tx: &Self::Tx,
        tenant: TenantId,
        slug: &str,
    ) -> Result<Vec<RelationshipEdge>> {
        let edges = self.edges_for_tenant(tx, tenant).await?;
        Ok(edges.into_iter().filter(|e| e.slug == slug).collect())
    }

    /// Total number of edges.
    async fn edge_count(&self, tx: &Self::Tx) -> Result<u64>;
}

// ============================================================================
// Transaction completion
// ============================================================================

/// Commit `tx` if `result` is Ok, roll it back otherwise.
///
/// A failed rollback is logged and the original error returned; the staged
/// writes are discarded either way.
pub(crate) async fn complete_tx<B: StorageBackend, T>(
    backend: &B,
    tx: B::Tx,
    result: Result<T>,
) -> Result<T> {
    match result {
        Ok(value) => {
            backend.commit_tx(tx).await?;
            Ok(value)
        }
        Err(err) => {
            let id = tx.id();
            if let Err(rollback_err) = backend.rollback_tx(tx).await {
                tracing::warn!(tx = %id, error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
