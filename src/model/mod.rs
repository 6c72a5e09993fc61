//! # Family Graph Model
//!
//! Plain DTOs shared by every layer: storage ↔ registry ↔ edge store ↔ queries.
//!
//! Design rule: this module is pure data. No I/O, no state, no async.

pub mod member;
pub mod relationship_type;
pub mod edge;

pub use member::{Member, MemberId, TenantId, Gender};
pub use relationship_type::{RelationshipType, NewRelationshipType, Category, TypeSummary};
pub use edge::{RelationshipEdge, EdgeKey, EdgePair, Related};
