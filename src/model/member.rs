//! Member (node) in the family graph.
//!
//! Members are owned by the surrounding application. The graph only reads
//! them through [`MemberDirectory`](crate::members::MemberDirectory).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Opaque tenant (household) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(pub u64);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque member identifier, stable for the lifetime of the member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub u64);

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unspecified,
}

/// A family member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub tenant: TenantId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub gender: Gender,
    pub is_living: bool,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
}

impl Member {
    pub fn new(id: MemberId, tenant: TenantId, first_name: impl Into<String>) -> Self {
        Self {
            id,
            tenant,
            first_name: first_name.into(),
            last_name: None,
            nickname: None,
            gender: Gender::Unspecified,
            is_living: true,
            birth_date: None,
            death_date: None,
        }
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = gender;
        self
    }

    pub fn born(mut self, date: NaiveDate) -> Self {
        self.birth_date = Some(date);
        self
    }

    /// Mark the member deceased on `date`.
    pub fn died(mut self, date: NaiveDate) -> Self {
        self.death_date = Some(date);
        self.is_living = false;
        self
    }

    /// Check the record-level constraints: a non-empty first name, and a
    /// death date that does not precede the birth date.
    pub fn validate(&self) -> Result<()> {
        if self.first_name.trim().is_empty() {
            return Err(Error::InvalidMember(format!("member {} has an empty first name", self.id)));
        }
        if let (Some(born), Some(died)) = (self.birth_date, self.death_date) {
            if died < born {
                return Err(Error::InvalidMember(format!(
                    "member {}: death date {died} precedes birth date {born}",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// "First Last", trimmed; just the first name when there is no last name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name.as_deref().unwrap_or(""))
            .trim()
            .to_string()
    }

    /// Nickname when set, otherwise the full name.
    pub fn display_name(&self) -> String {
        match self.nickname.as_deref() {
            Some(nick) if !nick.is_empty() => nick.to_string(),
            _ => self.full_name(),
        }
    }

    /// Age in whole years on `today`, or at death for deceased members.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let born = self.birth_date?;
        let end = self.death_date.unwrap_or(today);
        if end < born {
            return None;
        }
        let mut years = end.year() - born.year();
        if (end.month(), end.day()) < (born.month(), born.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_display_name_prefers_nickname() {
        let m = Member::new(MemberId(1), TenantId(1), "Karla").with_last_name("Jones");
        assert_eq!(m.display_name(), "Karla Jones");

        let m = m.with_nickname("KJ");
        assert_eq!(m.display_name(), "KJ");
        assert_eq!(m.full_name(), "Karla Jones");
    }

    #[test]
    fn test_full_name_without_last_name() {
        let m = Member::new(MemberId(1), TenantId(1), "Cher");
        assert_eq!(m.full_name(), "Cher");
    }

    #[test]
    fn test_death_before_birth_is_rejected() {
        let m = Member::new(MemberId(1), TenantId(1), "Ada")
            .born(date(1900, 5, 1))
            .died(date(1899, 1, 1));
        assert!(matches!(m.validate(), Err(Error::InvalidMember(_))));

        let ok = Member::new(MemberId(2), TenantId(1), "Ada")
            .born(date(1900, 5, 1))
            .died(date(1900, 5, 1));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_age_on() {
        let m = Member::new(MemberId(1), TenantId(1), "Ada").born(date(1990, 6, 15));
        assert_eq!(m.age_on(date(2020, 6, 14)), Some(29));
        assert_eq!(m.age_on(date(2020, 6, 15)), Some(30));

        let deceased = m.clone().died(date(2000, 1, 1));
        assert_eq!(deceased.age_on(date(2020, 6, 15)), Some(9));

        let unknown = Member::new(MemberId(2), TenantId(1), "Bob");
        assert_eq!(unknown.age_on(date(2020, 1, 1)), None);
    }
}
