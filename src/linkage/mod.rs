//! Name Linkage Resolver.
//!
//! Maps a free-text name (as typed into an event's "people involved" list)
//! to a member of one tenant. Matching is exact and case-sensitive after
//! trimming; the first rule that hits wins:
//!
//! 1. nickname
//! 2. first name
//! 3. first name + `' '` + last name (a missing last name counts as `""`)
//!
//! Within a rule, the member with the lowest id wins.

use crate::members::MemberDirectory;
use crate::model::{Member, MemberId, TenantId};
use crate::{Error, Result};

pub struct NameResolver<'g, D: MemberDirectory> {
    members: &'g D,
}

impl<'g, D: MemberDirectory> NameResolver<'g, D> {
    pub fn new(members: &'g D) -> Self {
        Self { members }
    }

    /// Resolve `text` to a member of `tenant`.
    pub async fn resolve(&self, tenant: TenantId, text: &str) -> Result<Member> {
        let name = text.trim();
        if name.is_empty() {
            return Err(Error::NotFound(text.to_string()));
        }
        let candidates = self.members.members_in_tenant(tenant).await?;
        match best_match(&candidates, name) {
            Some(member) => Ok(member.clone()),
            None => {
                tracing::debug!(tenant = %tenant, name, "no member matches name");
                Err(Error::NotFound(name.to_string()))
            }
        }
    }

    /// Resolve a list of names, dropping the unresolved ones and repeats.
    /// First-seen order is kept.
    pub async fn resolve_all<S: AsRef<str>>(&self, tenant: TenantId, names: &[S]) -> Result<Vec<MemberId>> {
        let candidates = self.members.members_in_tenant(tenant).await?;
        let mut resolved = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if let Some(member) = best_match(&candidates, name) {
                if !resolved.contains(&member.id) {
                    resolved.push(member.id);
                }
            }
        }
        Ok(resolved)
    }
}

type Rule = fn(&Member, &str) -> bool;

const RULES: [Rule; 3] = [
    |m, name| m.nickname.as_deref() == Some(name),
    |m, name| m.first_name == name,
    |m, name| format!("{} {}", m.first_name, m.last_name.as_deref().unwrap_or("")) == name,
];

fn best_match<'m>(candidates: &'m [Member], name: &str) -> Option<&'m Member> {
    RULES.iter().find_map(|rule| {
        candidates
            .iter()
            .filter(|m| rule(m, name))
            .min_by_key(|m| m.id)
    })
}
