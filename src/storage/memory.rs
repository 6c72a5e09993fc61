//! In-memory storage backend.
//!
//! This is the reference implementation of `StorageBackend`.
//! It keeps the committed tables in hash maps behind a single RwLock.
//!
//! ## Transactions
//!
//! - Writes are **staged** on the `MemoryTx` and only touch the shared tables
//!   in `commit_tx()`, which applies the whole batch under one write lock.
//!   Concurrent readers therefore see a committed pair completely or not at all.
//! - Reads through a transaction see its own staged writes layered over the
//!   committed state (read-your-writes).
//! - `rollback_tx()` (or simply dropping the transaction) discards the batch.
//! - Constraints are re-checked at commit: a slug inserted by a concurrent
//!   transaction aborts the commit with `DuplicateSlug`, and dropping a type
//!   that a committed edge still uses aborts it with `TypeInUse`. A duplicate
//!   edge is skipped (edge insertion is idempotent).
//!
//! Use this backend for:
//! - Testing the registry, edge store and query engine
//! - Embedding the graph in applications that don't need persistence

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::model::*;
use crate::tx::{Transaction, TxMode, TxId};
use crate::{Error, Result};
use super::StorageBackend;

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory relationship storage.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    state: RwLock<MemoryState>,
    next_tx_id: AtomicU64,
}

#[derive(Default)]
struct MemoryState {
    types: HashMap<String, RelationshipType>,
    edges: HashMap<EdgeKey, RelationshipEdge>,
    /// member → keys of edges leaving it
    outbound: HashMap<MemberId, BTreeSet<EdgeKey>>,
    /// member → keys of edges arriving at it
    inbound: HashMap<MemberId, BTreeSet<EdgeKey>>,
    by_tenant: HashMap<TenantId, BTreeSet<EdgeKey>>,
}

impl MemoryState {
    fn put_edge(&mut self, edge: RelationshipEdge) -> bool {
        let key = edge.key();
        if self.edges.contains_key(&key) {
            return false;
        }
        self.outbound.entry(edge.from).or_default().insert(key.clone());
        self.inbound.entry(edge.to).or_default().insert(key.clone());
        self.by_tenant.entry(edge.tenant).or_default().insert(key.clone());
        self.edges.insert(key, edge);
        true
    }

    fn drop_edge(&mut self, key: &EdgeKey) -> bool {
        let Some(edge) = self.edges.remove(key) else { return false };
        if let Some(keys) = self.outbound.get_mut(&edge.from) {
            keys.remove(key);
        }
        if let Some(keys) = self.inbound.get_mut(&edge.to) {
            keys.remove(key);
        }
        if let Some(keys) = self.by_tenant.get_mut(&edge.tenant) {
            keys.remove(key);
        }
        true
    }

    /// Check a batch against the committed tables before any of it is
    /// applied: a staged slug must still be free, and a dropped type must
    /// not be left referenced by a committed edge the batch keeps.
    fn validate(&self, staged: &[StagedWrite]) -> Result<()> {
        let mut dropped_types: HashSet<&str> = HashSet::new();
        let mut dropped_edges: HashSet<&EdgeKey> = HashSet::new();
        for write in staged {
            match write {
                StagedWrite::DropType(slug) => {
                    dropped_types.insert(slug.as_str());
                }
                StagedWrite::PutType(t) => {
                    if self.types.contains_key(&t.slug) && !dropped_types.contains(t.slug.as_str()) {
                        return Err(Error::DuplicateSlug(t.slug.clone()));
                    }
                    dropped_types.remove(t.slug.as_str());
                }
                StagedWrite::DropEdge(k) => {
                    dropped_edges.insert(k);
                }
                StagedWrite::PutEdge(_) => {}
            }
        }

        for slug in dropped_types {
            let kept = self
                .edges
                .keys()
                .filter(|k| k.slug == slug && !dropped_edges.contains(k))
                .count();
            if kept > 0 {
                return Err(Error::TypeInUse { slug: slug.to_string(), edges: kept });
            }
        }
        Ok(())
    }

    fn collect(&self, keys: Option<&BTreeSet<EdgeKey>>) -> Vec<RelationshipEdge> {
        keys.into_iter()
            .flatten()
            .filter_map(|k| self.edges.get(k).cloned())
            .collect()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                state: RwLock::new(MemoryState::default()),
                next_tx_id: AtomicU64::new(1),
            }),
        }
    }

    fn lookup_type(&self, tx: &MemoryTx, slug: &str) -> Option<RelationshipType> {
        match tx.staged_type(slug) {
            Some(staged) => staged.cloned(),
            None => self.inner.state.read().types.get(slug).cloned(),
        }
    }

    fn lookup_edge(&self, tx: &MemoryTx, key: &EdgeKey) -> Option<RelationshipEdge> {
        match tx.staged_edge(key) {
            Some(staged) => staged.cloned(),
            None => self.inner.state.read().edges.get(key).cloned(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

enum StagedWrite {
    PutType(RelationshipType),
    DropType(String),
    PutEdge(RelationshipEdge),
    DropEdge(EdgeKey),
}

/// In-memory transaction: an ordered batch of staged writes.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    // A link or unlink stages exactly two edge writes.
    staged: SmallVec<[StagedWrite; 4]>,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

impl MemoryTx {
    /// Number of writes waiting for commit.
    pub fn pending_writes(&self) -> usize {
        self.staged.len()
    }

    fn stage(&mut self, write: StagedWrite) -> Result<()> {
        if !self.is_writable() {
            return Err(Error::TxError(format!("{} is read-only", self.id)));
        }
        self.staged.push(write);
        Ok(())
    }

    /// Latest staged state of a type: `Some(None)` means staged for deletion,
    /// `None` means this transaction never touched it.
    fn staged_type(&self, slug: &str) -> Option<Option<&RelationshipType>> {
        self.staged.iter().rev().find_map(|w| match w {
            StagedWrite::PutType(t) if t.slug == slug => Some(Some(t)),
            StagedWrite::DropType(s) if s == slug => Some(None),
            _ => None,
        })
    }

    fn staged_edge(&self, key: &EdgeKey) -> Option<Option<&RelationshipEdge>> {
        self.staged.iter().rev().find_map(|w| match w {
            StagedWrite::PutEdge(e) if e.from == key.from && e.to == key.to && e.slug == key.slug => {
                Some(Some(e))
            }
            StagedWrite::DropEdge(k) if k == key => Some(None),
            _ => None,
        })
    }

    /// Layer staged edge writes matching `keep` over committed edges.
    fn overlay_edges(
        &self,
        committed: Vec<RelationshipEdge>,
        keep: impl Fn(&RelationshipEdge) -> bool,
    ) -> Vec<RelationshipEdge> {
        if self.staged.is_empty() {
            return committed;
        }
        let mut merged: BTreeMap<EdgeKey, RelationshipEdge> =
            committed.into_iter().map(|e| (e.key(), e)).collect();
        for write in &self.staged {
            match write {
                StagedWrite::PutEdge(e) if keep(e) => {
                    merged.entry(e.key()).or_insert_with(|| e.clone());
                }
                StagedWrite::DropEdge(k) => {
                    merged.remove(k);
                }
                _ => {}
            }
        }
        merged.into_values().collect()
    }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

#[async_trait]
impl StorageBackend for MemoryBackend {
    type Tx = MemoryTx;

    async fn shutdown(&self) -> Result<()> { Ok(()) }

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        Ok(MemoryTx { id, mode, staged: SmallVec::new() })
    }

    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        if tx.staged.is_empty() {
            return Ok(());
        }

        let mut state = self.inner.state.write();
        state.validate(&tx.staged)?;

        let count = tx.staged.len();
        for write in tx.staged {
            match write {
                StagedWrite::PutType(t) => {
                    state.types.insert(t.slug.clone(), t);
                }
                StagedWrite::DropType(slug) => {
                    state.types.remove(&slug);
                }
                StagedWrite::PutEdge(e) => {
                    state.put_edge(e);
                }
                StagedWrite::DropEdge(k) => {
                    state.drop_edge(&k);
                }
            }
        }

        tracing::trace!(tx = %tx.id, writes = count, "memory tx committed");
        Ok(())
    }

    async fn rollback_tx(&self, tx: MemoryTx) -> Result<()> {
        tracing::trace!(tx = %tx.id, discarded = tx.staged.len(), "memory tx rolled back");
        Ok(())
    }

    // ========================================================================
    // Relationship types
    // ========================================================================

    async fn get_type(&self, tx: &MemoryTx, slug: &str) -> Result<Option<RelationshipType>> {
        Ok(self.lookup_type(tx, slug))
    }

    async fn all_types(&self, tx: &MemoryTx) -> Result<Vec<RelationshipType>> {
        let mut merged: BTreeMap<String, RelationshipType> = self
            .inner
            .state
            .read()
            .types
            .iter()
            .map(|(slug, t)| (slug.clone(), t.clone()))
            .collect();
        for write in &tx.staged {
            match write {
                StagedWrite::PutType(t) => {
                    merged.insert(t.slug.clone(), t.clone());
                }
                StagedWrite::DropType(slug) => {
                    merged.remove(slug);
                }
                _ => {}
            }
        }
        Ok(merged.into_values().collect())
    }

    async fn insert_type(&self, tx: &mut MemoryTx, ty: RelationshipType) -> Result<()> {
        if self.lookup_type(tx, &ty.slug).is_some() {
            return Err(Error::DuplicateSlug(ty.slug));
        }
        tx.stage(StagedWrite::PutType(ty))
    }

    async fn delete_type(&self, tx: &mut MemoryTx, slug: &str) -> Result<bool> {
        if self.lookup_type(tx, slug).is_none() {
            return Ok(false);
        }
        tx.stage(StagedWrite::DropType(slug.to_string()))?;
        Ok(true)
    }

    // ========================================================================
    // Edges
    // ========================================================================

    async fn get_edge(&self, tx: &MemoryTx, key: &EdgeKey) -> Result<Option<RelationshipEdge>> {
        Ok(self.lookup_edge(tx, key))
    }

    async fn insert_edge(&self, tx: &mut MemoryTx, edge: RelationshipEdge) -> Result<bool> {
        if self.lookup_edge(tx, &edge.key()).is_some() {
            return Ok(false);
        }
        tx.stage(StagedWrite::PutEdge(edge))?;
        Ok(true)
    }

    async fn delete_edge(&self, tx: &mut MemoryTx, key: &EdgeKey) -> Result<bool> {
        if self.lookup_edge(tx, key).is_none() {
            return Ok(false);
        }
        tx.stage(StagedWrite::DropEdge(key.clone()))?;
        Ok(true)
    }

    async fn edges_from(&self, tx: &MemoryTx, member: MemberId) -> Result<Vec<RelationshipEdge>> {
        let committed = {
            let state = self.inner.state.read();
            state.collect(state.outbound.get(&member))
        };
        Ok(tx.overlay_edges(committed, |e| e.from == member))
    }

    async fn edges_to(&self, tx: &MemoryTx, member: MemberId) -> Result<Vec<RelationshipEdge>> {
        let committed = {
            let state = self.inner.state.read();
            state.collect(state.inbound.get(&member))
        };
        Ok(tx.overlay_edges(committed, |e| e.to == member))
    }

    async fn edges_for_tenant(&self, tx: &MemoryTx, tenant: TenantId) -> Result<Vec<RelationshipEdge>> {
        let committed = {
            let state = self.inner.state.read();
            state.collect(state.by_tenant.get(&tenant))
        };
        Ok(tx.overlay_edges(committed, |e| e.tenant == tenant))
    }

    async fn edge_count(&self, tx: &MemoryTx) -> Result<u64> {
        let committed = self.inner.state.read().edges.len() as i64;
        let mut delta = 0i64;
        // Count through lookups so repeated writes to one key are not double counted.
        let mut seen: HashSet<EdgeKey> = HashSet::new();
        for write in tx.staged.iter().rev() {
            let key = match write {
                StagedWrite::PutEdge(e) => e.key(),
                StagedWrite::DropEdge(k) => k.clone(),
                _ => continue,
            };
            if !seen.insert(key.clone()) {
                continue;
            }
            let was = self.inner.state.read().edges.contains_key(&key);
            let now = self.lookup_edge(tx, &key).is_some();
            delta += i64::from(now) - i64::from(was);
        }
        Ok((committed + delta).max(0) as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn edge(from: u64, to: u64, slug: &str) -> RelationshipEdge {
        RelationshipEdge::new(TenantId(1), MemberId(from), MemberId(to), slug, Utc::now())
    }

    fn custom_type(slug: &str) -> RelationshipType {
        RelationshipType {
            slug: slug.into(),
            label: slug.into(),
            category: Category::NonFamily,
            inverse_slug: None,
            is_system: false,
            sort_order: 0,
            tenant: Some(TenantId(1)),
        }
    }

    #[tokio::test]
    async fn test_staged_writes_invisible_until_commit() {
        let db = MemoryBackend::new();
        let mut writer = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        assert!(db.insert_edge(&mut writer, edge(1, 2, "friend")).await.unwrap());

        // The writer sees its own write, a concurrent reader does not.
        assert_eq!(db.edges_from(&writer, MemberId(1)).await.unwrap().len(), 1);
        let reader = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert!(db.edges_from(&reader, MemberId(1)).await.unwrap().is_empty());

        db.commit_tx(writer).await.unwrap();
        assert_eq!(db.edges_from(&reader, MemberId(1)).await.unwrap().len(), 1);
        assert_eq!(db.edges_to(&reader, MemberId(2)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_everything() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.insert_edge(&mut tx, edge(1, 2, "friend")).await.unwrap();
        db.insert_edge(&mut tx, edge(2, 1, "friend")).await.unwrap();
        assert_eq!(tx.pending_writes(), 2);
        db.rollback_tx(tx).await.unwrap();

        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert_eq!(db.edge_count(&tx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_edge_is_not_inserted() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        assert!(db.insert_edge(&mut tx, edge(1, 2, "friend")).await.unwrap());
        assert!(!db.insert_edge(&mut tx, edge(1, 2, "friend")).await.unwrap());
        assert_eq!(db.edge_count(&tx).await.unwrap(), 1);
        db.commit_tx(tx).await.unwrap();

        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        assert!(!db.insert_edge(&mut tx, edge(1, 2, "friend")).await.unwrap());
        assert_eq!(tx.pending_writes(), 0);
    }

    #[tokio::test]
    async fn test_delete_then_count() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.insert_edge(&mut tx, edge(1, 2, "friend")).await.unwrap();
        db.insert_edge(&mut tx, edge(2, 1, "friend")).await.unwrap();
        db.commit_tx(tx).await.unwrap();

        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let key = EdgeKey::new(MemberId(1), MemberId(2), "friend");
        assert!(db.delete_edge(&mut tx, &key).await.unwrap());
        assert!(!db.delete_edge(&mut tx, &key).await.unwrap());
        assert_eq!(db.edge_count(&tx).await.unwrap(), 1);
        assert!(db.get_edge(&tx, &key).await.unwrap().is_none());
        db.commit_tx(tx).await.unwrap();

        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert_eq!(db.edge_count(&tx).await.unwrap(), 1);
        assert!(db.edges_from(&tx, MemberId(1)).await.unwrap().is_empty());
        assert_eq!(db.edges_for_tenant(&tx, TenantId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_only_tx_rejects_writes() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        let result = db.insert_edge(&mut tx, edge(1, 2, "friend")).await;
        assert!(matches!(result, Err(Error::TxError(_))));
    }

    #[tokio::test]
    async fn test_type_uniqueness() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.insert_type(&mut tx, custom_type("mentor")).await.unwrap();
        let dup = db.insert_type(&mut tx, custom_type("mentor")).await;
        assert!(matches!(dup, Err(Error::DuplicateSlug(s)) if s == "mentor"));
        db.commit_tx(tx).await.unwrap();

        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert!(db.get_type(&tx, "mentor").await.unwrap().is_some());
        assert_eq!(db.all_types(&tx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conflicting_type_commit_applies_nothing() {
        let db = MemoryBackend::new();
        let mut first = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let mut second = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        db.insert_type(&mut first, custom_type("mentor")).await.unwrap();
        db.insert_edge(&mut second, edge(1, 2, "friend")).await.unwrap();
        db.insert_type(&mut second, custom_type("mentor")).await.unwrap();

        db.commit_tx(first).await.unwrap();
        let result = db.commit_tx(second).await;
        assert!(matches!(result, Err(Error::DuplicateSlug(_))));

        // The edge staged alongside the conflicting type was not applied either.
        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert_eq!(db.edge_count(&tx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_type_in_tx() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.insert_type(&mut tx, custom_type("mentor")).await.unwrap();
        db.commit_tx(tx).await.unwrap();

        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        assert!(db.delete_type(&mut tx, "mentor").await.unwrap());
        assert!(db.get_type(&tx, "mentor").await.unwrap().is_none());
        assert!(db.all_types(&tx).await.unwrap().is_empty());
        assert!(!db.delete_type(&mut tx, "mentor").await.unwrap());
        db.commit_tx(tx).await.unwrap();

        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert!(db.get_type(&tx, "mentor").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_type_drop_rejected_while_edges_remain() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.insert_type(&mut tx, custom_type("mentor")).await.unwrap();
        db.commit_tx(tx).await.unwrap();

        // The drop saw no edges, but one commits before it does.
        let mut dropper = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        assert!(db.edges_by_type(&dropper, TenantId(1), "mentor").await.unwrap().is_empty());
        db.delete_type(&mut dropper, "mentor").await.unwrap();

        let mut linker = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.insert_edge(&mut linker, edge(1, 2, "mentor")).await.unwrap();
        db.commit_tx(linker).await.unwrap();

        let result = db.commit_tx(dropper).await;
        assert!(matches!(result, Err(Error::TypeInUse { ref slug, edges: 1 }) if slug == "mentor"));
        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert!(db.get_type(&tx, "mentor").await.unwrap().is_some());

        // Dropping the edge in the same batch lets the type go.
        let mut cascade = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.delete_edge(&mut cascade, &EdgeKey::new(MemberId(1), MemberId(2), "mentor")).await.unwrap();
        db.delete_type(&mut cascade, "mentor").await.unwrap();
        db.commit_tx(cascade).await.unwrap();
        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert!(db.get_type(&tx, "mentor").await.unwrap().is_none());
        assert_eq!(db.edge_count(&tx).await.unwrap(), 0);
    }
}
