//! # kinship — Multi-tenant Family Relationship Graph
//!
//! Typed, bidirectional relationships between family members, partitioned
//! by tenant (one family group per tenant).
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the engine and storage
//! 2. **Pairs, never halves**: every write lands a forward edge together with its inverse
//! 3. **Static taxonomy**: derived queries read a compiled-in classification table
//! 4. **Members are external**: the graph only reads them through `MemberDirectory`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kinship::{FamilyGraph, Gender, Member, MemberId, TenantId};
//! use kinship::members::MemoryMemberDirectory;
//!
//! # async fn example() -> kinship::Result<()> {
//! let family = TenantId(1);
//! let members = MemoryMemberDirectory::new();
//! members.insert(Member::new(MemberId(1), family, "Alice"))?;
//! members.insert(Member::new(MemberId(2), family, "Bob").with_gender(Gender::Male))?;
//!
//! let graph = FamilyGraph::open_memory(members).await?;
//!
//! // Bob is Alice's father; Alice becomes Bob's child_of_father.
//! graph.link(MemberId(1), MemberId(2), "father").await?;
//!
//! for related in graph.query().father(MemberId(1)).await? {
//!     println!("{} via {}", related.member, related.slug);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! | Layer | Module | Description |
//! |-------|--------|-------------|
//! | Type registry | `registry` | Global + tenant-private relationship types |
//! | Edge store | `edges` | Atomic pair writes under a per-pair lock |
//! | Queries | `query` | father, mother, parents, ... and family trees |
//! | Name linkage | `linkage` | Free-text name → member |
//! | Audit | `consistency` | Reports half pairs and other damage |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod taxonomy;
pub mod storage;
pub mod tx;
pub mod members;
pub mod config;
pub mod registry;
pub mod edges;
pub mod query;
pub mod linkage;
pub mod consistency;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Member, MemberId, TenantId, Gender,
    RelationshipType, NewRelationshipType, Category, TypeSummary,
    RelationshipEdge, EdgeKey, EdgePair, Related,
};

// ============================================================================
// Re-exports: Storage, transactions, configuration
// ============================================================================

pub use storage::{StorageBackend, MemoryBackend};
pub use tx::{Transaction, TxMode, TxId};
pub use config::{GraphConfig, BackendConfig, TypeDeletionPolicy};

// ============================================================================
// Re-exports: Engine
// ============================================================================

pub use members::MemberDirectory;
pub use taxonomy::KinClass;
pub use registry::TypeRegistry;
pub use edges::{EdgeStore, PairLocks};
pub use query::{RelationQuery, Relation, TreeNode};
pub use linkage::NameResolver;
pub use consistency::{Auditor, ConsistencyReport, Finding};

use std::collections::BTreeSet;

// ============================================================================
// Top-level FamilyGraph handle
// ============================================================================

/// The primary entry point. A `FamilyGraph` owns a storage backend, a
/// member directory and the pair-lock table, and hands out short-lived
/// views (`registry()`, `edges()`, `query()`, ...) that borrow them.
///
/// Share it across tasks behind an `Arc`.
pub struct FamilyGraph<B: StorageBackend, D: MemberDirectory> {
    backend: B,
    members: D,
    config: GraphConfig,
    pair_locks: PairLocks,
}

impl<B: StorageBackend, D: MemberDirectory> FamilyGraph<B, D> {
    /// Create a graph over the given backend, seeding the system types if
    /// the configuration asks for it.
    pub async fn with_backend(backend: B, members: D, config: GraphConfig) -> Result<Self> {
        let graph = Self { backend, members, config, pair_locks: PairLocks::new() };
        if graph.config.seed_defaults {
            graph.registry().seed_defaults().await?;
        }
        Ok(graph)
    }

    pub fn registry(&self) -> TypeRegistry<'_, B> {
        TypeRegistry::new(&self.backend, self.config.type_deletion).with_locks(&self.pair_locks)
    }

    pub fn edges(&self) -> EdgeStore<'_, B, D> {
        EdgeStore::new(&self.backend, &self.members, &self.pair_locks, self.config.type_deletion)
    }

    pub fn query(&self) -> RelationQuery<'_, B, D> {
        RelationQuery::new(self.edges(), &self.members)
    }

    pub fn linker(&self) -> NameResolver<'_, D> {
        NameResolver::new(&self.members)
    }

    pub fn auditor(&self) -> Auditor<'_, B, D> {
        Auditor::new(&self.backend, &self.members)
    }

    // ========================================================================
    // Shortcuts
    // ========================================================================

    /// Record that `b` is the `slug` of `a` (and the inverse fact).
    pub async fn link(&self, a: MemberId, b: MemberId, slug: &str) -> Result<EdgePair> {
        self.edges().link(a, b, slug).await
    }

    pub async fn unlink(&self, a: MemberId, b: MemberId, slug: &str) -> Result<usize> {
        self.edges().unlink(a, b, slug).await
    }

    pub async fn relatives(&self, member: MemberId, relation: Relation) -> Result<BTreeSet<Related>> {
        self.query().relatives(member, relation).await
    }

    pub async fn resolve(&self, tenant: TenantId, text: &str) -> Result<Member> {
        self.linker().resolve(tenant, text).await
    }

    pub async fn audit(&self, tenant: TenantId) -> Result<ConsistencyReport> {
        self.auditor().audit(tenant).await
    }

    pub async fn family_tree(&self, tenant: TenantId) -> Result<Vec<TreeNode>> {
        self.query().family_tree(tenant).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.backend.shutdown().await
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn members(&self) -> &D {
        &self.members
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// In-memory graph for testing and embedding.
impl<D: MemberDirectory> FamilyGraph<MemoryBackend, D> {
    pub async fn open_memory(members: D) -> Result<Self> {
        Self::open(GraphConfig::default(), members).await
    }

    pub async fn open(config: GraphConfig, members: D) -> Result<Self> {
        let backend = match config.backend {
            BackendConfig::Memory => MemoryBackend::new(),
        };
        Self::with_backend(backend, members, config).await
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown relationship type: {0}")]
    UnknownType(String),

    #[error("Relationship type slug already taken: {0}")]
    DuplicateSlug(String),

    #[error("Invalid inverse '{inverse}' for type '{slug}': {reason}")]
    InvalidInverse { slug: String, inverse: String, reason: String },

    #[error("Invalid slug '{0}': use lowercase letters, digits and underscores")]
    InvalidSlug(String),

    #[error("Member {0} cannot be related to itself")]
    SelfEdge(MemberId),

    #[error("Member {from} (tenant {from_tenant}) and member {to} (tenant {to_tenant}) are in different tenants")]
    CrossTenantEdge { from: MemberId, from_tenant: TenantId, to: MemberId, to_tenant: TenantId },

    #[error("Member not found: {0}")]
    MemberNotFound(MemberId),

    #[error("Relationship type '{slug}' is not available to tenant {tenant}")]
    TypeNotAvailable { slug: String, tenant: TenantId },

    #[error("Relationship type '{slug}' is still used by {edges} edges")]
    TypeInUse { slug: String, edges: usize },

    #[error("System relationship type cannot be changed: {0}")]
    SystemType(String),

    #[error("Invalid member: {0}")]
    InvalidMember(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors the caller can fix by changing the request. Everything else
    /// is an infrastructure failure.
    pub fn is_input_error(&self) -> bool {
        !matches!(
            self,
            Error::TxError(_) | Error::StorageError(_) | Error::Io(_) | Error::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::MemoryMemberDirectory;

    #[tokio::test]
    async fn test_open_seeds_by_default() {
        let graph = FamilyGraph::open_memory(MemoryMemberDirectory::new()).await.unwrap();
        assert_eq!(graph.registry().resolve("father").await.unwrap().inverse(), "child_of_father");
    }

    #[tokio::test]
    async fn test_open_without_seed() {
        let config = GraphConfig::default().without_seed();
        let graph = FamilyGraph::open(config, MemoryMemberDirectory::new()).await.unwrap();
        assert!(graph.registry().list_for_tenant(TenantId(1)).await.unwrap().is_empty());
    }

    #[test]
    fn test_input_errors() {
        assert!(Error::SelfEdge(MemberId(1)).is_input_error());
        assert!(Error::UnknownType("x".into()).is_input_error());
        assert!(!Error::StorageError("disk".into()).is_input_error());
    }
}
