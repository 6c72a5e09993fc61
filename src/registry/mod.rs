//! Relationship Type Registry.
//!
//! Owns the catalog of relationship types: the global system types seeded
//! at bootstrap plus tenant-private additions. Slugs are unique across all
//! scopes, so a tenant can never shadow a system slug.

use std::collections::BTreeMap;

use crate::config::TypeDeletionPolicy;
use crate::edges::PairLocks;
use crate::model::*;
use crate::storage::{complete_tx, StorageBackend};
use crate::taxonomy;
use crate::tx::TxMode;
use crate::{Error, Result};

/// Registry view over a storage backend.
pub struct TypeRegistry<'g, B: StorageBackend> {
    backend: &'g B,
    deletion: TypeDeletionPolicy,
    locks: Option<&'g PairLocks>,
}

impl<'g, B: StorageBackend> TypeRegistry<'g, B> {
    pub fn new(backend: &'g B, deletion: TypeDeletionPolicy) -> Self {
        Self { backend, deletion, locks: None }
    }

    /// Make [`remove`](Self::remove) wait out the pair writes made through
    /// the same lock table.
    pub fn with_locks(mut self, locks: &'g PairLocks) -> Self {
        self.locks = Some(locks);
        self
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Resolve a slug. Fails with `Error::NotFound` for unknown slugs.
    pub async fn resolve(&self, slug: &str) -> Result<RelationshipType> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let found = self.backend.get_type(&tx, slug).await;
        complete_tx(self.backend, tx, found)
            .await?
            .ok_or_else(|| Error::NotFound(format!("relationship type '{slug}'")))
    }

    /// The inverse slug; a type without an inverse is its own inverse.
    pub async fn inverse_of(&self, slug: &str) -> Result<String> {
        match self.resolve(slug).await {
            Ok(ty) => Ok(ty.inverse().to_string()),
            Err(Error::NotFound(_)) => Err(Error::UnknownType(slug.to_string())),
            Err(e) => Err(e),
        }
    }

    pub(crate) async fn resolve_in(&self, tx: &B::Tx, slug: &str) -> Result<RelationshipType> {
        self.backend
            .get_type(tx, slug)
            .await?
            .ok_or_else(|| Error::UnknownType(slug.to_string()))
    }

    /// Global and tenant-private types, interleaved by sort order.
    pub async fn list_for_tenant(&self, tenant: TenantId) -> Result<Vec<RelationshipType>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let all = self.backend.all_types(&tx).await;
        let mut types: Vec<_> = complete_tx(self.backend, tx, all)
            .await?
            .into_iter()
            .filter(|t| t.available_to(tenant))
            .collect();
        types.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.slug.cmp(&b.slug)));
        Ok(types)
    }

    /// Slugs a tenant may pass to `link`.
    pub async fn valid_slugs(&self, tenant: TenantId) -> Result<Vec<String>> {
        Ok(self.list_for_tenant(tenant).await?.into_iter().map(|t| t.slug).collect())
    }

    /// Picker projection: every category is present, even when empty.
    pub async fn grouped_by_category(
        &self,
        tenant: TenantId,
    ) -> Result<BTreeMap<Category, Vec<TypeSummary>>> {
        let mut grouped: BTreeMap<Category, Vec<TypeSummary>> =
            Category::ALL.into_iter().map(|c| (c, Vec::new())).collect();
        for ty in self.list_for_tenant(tenant).await? {
            grouped.entry(ty.category).or_default().push(ty.summary());
        }
        Ok(grouped)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Insert every system type that is not present yet. Returns how many
    /// were inserted; running it twice inserts nothing the second time.
    pub async fn seed_defaults(&self) -> Result<usize> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = self.seed_in(&mut tx).await;
        let inserted = complete_tx(self.backend, tx, result).await?;
        tracing::info!(inserted, version = taxonomy::TAXONOMY_VERSION, "seeded system relationship types");
        Ok(inserted)
    }

    async fn seed_in(&self, tx: &mut B::Tx) -> Result<usize> {
        let mut inserted = 0;
        for ty in taxonomy::system_types() {
            if self.backend.get_type(tx, &ty.slug).await?.is_none() {
                self.backend.insert_type(tx, ty).await?;
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Add a tenant-private type.
    ///
    /// Without an inverse (or with its own slug as inverse) the type is
    /// symmetric. A foreign inverse must exist, be visible to the tenant and
    /// already name this slug as its own inverse; use [`register_pair`]
    /// to create two new mutually inverse types.
    ///
    /// [`register_pair`]: Self::register_pair
    pub async fn register(
        &self,
        tenant: TenantId,
        new: NewRelationshipType,
    ) -> Result<RelationshipType> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = self.register_in(&mut tx, tenant, new).await;
        let ty = complete_tx(self.backend, tx, result).await?;
        tracing::info!(tenant = %tenant, slug = %ty.slug, inverse = %ty.inverse(), "registered relationship type");
        Ok(ty)
    }

    async fn register_in(
        &self,
        tx: &mut B::Tx,
        tenant: TenantId,
        new: NewRelationshipType,
    ) -> Result<RelationshipType> {
        validate_slug(&new.slug)?;
        if let Some(inverse) = new.inverse_slug.as_deref().filter(|inv| *inv != new.slug) {
            let target = self.backend.get_type(tx, inverse).await?;
            match target {
                Some(t) if t.available_to(tenant) && t.inverse() == new.slug => {}
                Some(_) => {
                    return Err(Error::InvalidInverse {
                        slug: new.slug,
                        inverse: inverse.to_string(),
                        reason: "inverse type does not point back".into(),
                    });
                }
                None => {
                    return Err(Error::InvalidInverse {
                        slug: new.slug,
                        inverse: inverse.to_string(),
                        reason: "no such type".into(),
                    });
                }
            }
        }
        let ty = tenant_type(tenant, new);
        self.backend.insert_type(tx, ty.clone()).await?;
        Ok(ty)
    }

    /// Add two tenant-private types that are each other's inverse, in one
    /// transaction. The inverse slugs of the inputs are overwritten.
    pub async fn register_pair(
        &self,
        tenant: TenantId,
        forward: NewRelationshipType,
        backward: NewRelationshipType,
    ) -> Result<(RelationshipType, RelationshipType)> {
        validate_slug(&forward.slug)?;
        validate_slug(&backward.slug)?;
        if forward.slug == backward.slug {
            return Err(Error::InvalidInverse {
                slug: forward.slug,
                inverse: backward.slug,
                reason: "a pair needs two distinct slugs; register a symmetric type instead".into(),
            });
        }

        let forward = forward.with_inverse(backward.slug.clone());
        let backward = backward.with_inverse(forward.slug.clone());
        let (fwd, bwd) = (tenant_type(tenant, forward), tenant_type(tenant, backward));

        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = async {
            self.backend.insert_type(&mut tx, fwd.clone()).await?;
            self.backend.insert_type(&mut tx, bwd.clone()).await
        }
        .await;
        complete_tx(self.backend, tx, result).await?;
        tracing::info!(tenant = %tenant, forward = %fwd.slug, backward = %bwd.slug, "registered relationship type pair");
        Ok((fwd, bwd))
    }

    /// Delete a tenant-private type (and its inverse partner, if it has one).
    ///
    /// Returns the number of edges removed, which is always 0 under
    /// [`TypeDeletionPolicy::Block`].
    pub async fn remove(&self, tenant: TenantId, slug: &str) -> Result<usize> {
        let _types = match self.locks {
            Some(locks) => Some(locks.lock_types().await),
            None => None,
        };
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = self.remove_in(&mut tx, tenant, slug).await;
        let removed = complete_tx(self.backend, tx, result).await?;
        tracing::info!(tenant = %tenant, slug, edges_removed = removed, policy = ?self.deletion, "removed relationship type");
        Ok(removed)
    }

    async fn remove_in(&self, tx: &mut B::Tx, tenant: TenantId, slug: &str) -> Result<usize> {
        let ty = self.resolve_in(tx, slug).await?;
        if ty.is_system {
            return Err(Error::SystemType(slug.to_string()));
        }
        if ty.tenant != Some(tenant) {
            return Err(Error::UnknownType(slug.to_string()));
        }

        let mut slugs = vec![ty.slug.clone()];
        if ty.inverse() != ty.slug {
            slugs.push(ty.inverse().to_string());
        }

        let mut referencing = Vec::new();
        for s in &slugs {
            referencing.extend(self.backend.edges_by_type(tx, tenant, s).await?);
        }

        let mut removed = 0;
        if !referencing.is_empty() {
            match self.deletion {
                TypeDeletionPolicy::Block => {
                    return Err(Error::TypeInUse { slug: slug.to_string(), edges: referencing.len() });
                }
                TypeDeletionPolicy::Cascade => {
                    // Every referencing edge carries one of `slugs`, and its
                    // partner carries the other, so both halves are in the list.
                    for edge in &referencing {
                        if self.backend.delete_edge(tx, &edge.key()).await? {
                            removed += 1;
                        }
                    }
                }
            }
        }

        for s in &slugs {
            self.backend.delete_type(tx, s).await?;
        }
        Ok(removed)
    }
}

fn tenant_type(tenant: TenantId, new: NewRelationshipType) -> RelationshipType {
    RelationshipType {
        slug: new.slug,
        label: new.label,
        category: new.category,
        inverse_slug: new.inverse_slug,
        is_system: false,
        sort_order: new.sort_order,
        tenant: Some(tenant),
    }
}

fn validate_slug(slug: &str) -> Result<()> {
    let valid = !slug.is_empty()
        && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidSlug(slug.to_string()))
    }
}
