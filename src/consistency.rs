//! Consistency audit.
//!
//! Read-only sweep over one tenant's edges that reports everything `link`
//! would never have produced: half pairs, edges typed with a slug the
//! registry no longer knows, self edges, edges whose members left the
//! tenant, and classified types whose inverse lands in the wrong class.
//! Nothing is repaired here; `EdgeStore::link` repairs half pairs.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::members::MemberDirectory;
use crate::model::*;
use crate::storage::{complete_tx, StorageBackend};
use crate::taxonomy::{self, ClassificationMismatch};
use crate::tx::TxMode;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// The paired edge `expected` is absent.
    MissingInverse { edge: EdgeKey, expected: EdgeKey },
    /// The edge's slug is not in the registry.
    DanglingType { edge: EdgeKey },
    SelfEdge { edge: EdgeKey },
    /// An endpoint belongs to another tenant than the edge.
    CrossTenant { edge: EdgeKey, member: MemberId, member_tenant: TenantId },
    /// An endpoint is gone from the member directory.
    MissingMember { edge: EdgeKey, member: MemberId },
    ClassificationMismatch(ClassificationMismatch),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub tenant: TenantId,
    pub edges_checked: usize,
    pub findings: Vec<Finding>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

pub struct Auditor<'g, B: StorageBackend, D: MemberDirectory> {
    backend: &'g B,
    members: &'g D,
}

impl<'g, B: StorageBackend, D: MemberDirectory> Auditor<'g, B, D> {
    pub fn new(backend: &'g B, members: &'g D) -> Self {
        Self { backend, members }
    }

    pub async fn audit(&self, tenant: TenantId) -> Result<ConsistencyReport> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let snapshot = self.snapshot(&tx, tenant).await;
        let (types, edges) = complete_tx(self.backend, tx, snapshot).await?;

        let types: HashMap<&str, &RelationshipType> =
            types.iter().map(|t| (t.slug.as_str(), t)).collect();
        let keys: HashSet<EdgeKey> = edges.iter().map(RelationshipEdge::key).collect();
        let mut tenants: HashMap<MemberId, Option<TenantId>> = HashMap::new();
        let mut findings = Vec::new();

        for edge in &edges {
            let key = edge.key();
            if edge.from == edge.to {
                findings.push(Finding::SelfEdge { edge: key.clone() });
            }

            match types.get(edge.slug.as_str()) {
                Some(ty) => {
                    let expected = key.inverse(ty.inverse());
                    if !keys.contains(&expected) {
                        findings.push(Finding::MissingInverse { edge: key.clone(), expected });
                    }
                }
                None => findings.push(Finding::DanglingType { edge: key.clone() }),
            }

            for member in [edge.from, edge.to] {
                let member_tenant = match tenants.get(&member) {
                    Some(found) => *found,
                    None => {
                        let found = self.members.get(member).await?.map(|m| m.tenant);
                        tenants.insert(member, found);
                        found
                    }
                };
                match member_tenant {
                    None => findings.push(Finding::MissingMember { edge: key.clone(), member }),
                    Some(t) if t != edge.tenant => findings.push(Finding::CrossTenant {
                        edge: key.clone(),
                        member,
                        member_tenant: t,
                    }),
                    Some(_) => {}
                }
            }
        }

        let visible: Vec<RelationshipType> = types
            .values()
            .filter(|t| t.available_to(tenant))
            .map(|t| (*t).clone())
            .collect();
        let mut mismatches = taxonomy::verify_types(&visible);
        mismatches.sort_by(|a, b| a.slug.cmp(&b.slug));
        findings.extend(mismatches.into_iter().map(Finding::ClassificationMismatch));

        if findings.is_empty() {
            tracing::debug!(tenant = %tenant, edges = edges.len(), "audit clean");
        } else {
            tracing::warn!(tenant = %tenant, edges = edges.len(), findings = findings.len(), "audit found inconsistencies");
        }

        Ok(ConsistencyReport { tenant, edges_checked: edges.len(), findings })
    }

    async fn snapshot(
        &self,
        tx: &B::Tx,
        tenant: TenantId,
    ) -> Result<(Vec<RelationshipType>, Vec<RelationshipEdge>)> {
        let types = self.backend.all_types(tx).await?;
        let edges = self.backend.edges_for_tenant(tx, tenant).await?;
        Ok((types, edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypeDeletionPolicy;
    use crate::edges::{EdgeStore, PairLocks};
    use crate::members::MemoryMemberDirectory;
    use crate::registry::TypeRegistry;
    use crate::storage::MemoryBackend;
    use chrono::Utc;

    async fn setup() -> (MemoryBackend, MemoryMemberDirectory) {
        let db = MemoryBackend::new();
        TypeRegistry::new(&db, TypeDeletionPolicy::Block).seed_defaults().await.unwrap();
        let dir = MemoryMemberDirectory::new();
        for (id, tenant) in [(1, 1), (2, 1), (3, 2)] {
            dir.insert(Member::new(MemberId(id), TenantId(tenant), format!("m{id}"))).unwrap();
        }
        (db, dir)
    }

    async fn insert_raw(db: &MemoryBackend, edge: RelationshipEdge) {
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.insert_edge(&mut tx, edge).await.unwrap();
        db.commit_tx(tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_linked_graph_is_clean() {
        let (db, dir) = setup().await;
        let locks = PairLocks::new();
        let store = EdgeStore::new(&db, &dir, &locks, TypeDeletionPolicy::Block);
        store.link(MemberId(1), MemberId(2), "father").await.unwrap();
        store.link(MemberId(1), MemberId(2), "friend").await.unwrap();

        let report = Auditor::new(&db, &dir).audit(TenantId(1)).await.unwrap();
        assert!(report.is_clean(), "{:?}", report.findings);
        assert_eq!(report.edges_checked, 4);
    }

    #[tokio::test]
    async fn test_raw_edges_are_reported() {
        let (db, dir) = setup().await;
        let now = Utc::now();
        let t = TenantId(1);
        insert_raw(&db, RelationshipEdge::new(t, MemberId(1), MemberId(2), "mother", now)).await;
        insert_raw(&db, RelationshipEdge::new(t, MemberId(1), MemberId(1), "friend", now)).await;
        insert_raw(&db, RelationshipEdge::new(t, MemberId(2), MemberId(1), "nemesis", now)).await;
        insert_raw(&db, RelationshipEdge::new(t, MemberId(2), MemberId(3), "cousin", now)).await;
        insert_raw(&db, RelationshipEdge::new(t, MemberId(2), MemberId(44), "cousin", now)).await;

        let report = Auditor::new(&db, &dir).audit(t).await.unwrap();
        let has = |pred: &dyn Fn(&Finding) -> bool| report.findings.iter().any(pred);

        assert!(has(&|f| matches!(f, Finding::MissingInverse { expected, .. }
            if *expected == EdgeKey::new(MemberId(2), MemberId(1), "child_of_mother"))));
        assert!(has(&|f| matches!(f, Finding::SelfEdge { .. })));
        assert!(has(&|f| matches!(f, Finding::DanglingType { edge } if edge.slug == "nemesis")));
        assert!(has(&|f| matches!(f, Finding::CrossTenant { member: MemberId(3), .. })));
        assert!(has(&|f| matches!(f, Finding::MissingMember { member: MemberId(44), .. })));
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_classified_type_with_wrong_class_inverse() {
        // Hand-built catalog where husband pairs with a non-spouse slug.
        let db = MemoryBackend::new();
        let dir = MemoryMemberDirectory::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        for (slug, inverse) in [("husband", "friend"), ("friend", "friend")] {
            db.insert_type(&mut tx, RelationshipType {
                slug: slug.into(),
                label: slug.into(),
                category: Category::Immediate,
                inverse_slug: Some(inverse.into()),
                is_system: true,
                sort_order: 0,
                tenant: None,
            })
            .await
            .unwrap();
        }
        db.commit_tx(tx).await.unwrap();

        let report = Auditor::new(&db, &dir).audit(TenantId(1)).await.unwrap();
        assert_eq!(report.findings, vec![Finding::ClassificationMismatch(ClassificationMismatch {
            slug: "husband".into(),
            class: taxonomy::KinClass::Spouse,
            inverse: "friend".into(),
            inverse_class: None,
        })]);
        assert!(taxonomy::verify_classification().is_empty());
    }
}
