//! Section-level access control.
//!
//! Every access decision in the crate goes through [`can_access`]. The
//! result is derived from the account's current role and permissions each
//! time; nothing here is cached across permission edits.

use crate::models::{Account, PermissionSet, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fixed application sections an account can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    Dashboard,
    Approval,
    Acl,
    Categories,
    Advertisements,
    Team,
    Users,
    News,
    MyPanel,
    Support,
}

impl Section {
    pub const ALL: [Section; 10] = [
        Section::Dashboard,
        Section::Approval,
        Section::Acl,
        Section::Categories,
        Section::Advertisements,
        Section::Team,
        Section::Users,
        Section::News,
        Section::MyPanel,
        Section::Support,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Dashboard => "dashboard",
            Section::Approval => "approval",
            Section::Acl => "acl",
            Section::Categories => "categories",
            Section::Advertisements => "advertisements",
            Section::Team => "team",
            Section::Users => "users",
            Section::News => "news",
            Section::MyPanel => "my-panel",
            Section::Support => "support",
        }
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .iter()
            .copied()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| format!("unknown section '{}'", s))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permissions handed to a freshly created reporter.
pub fn default_reporter_permissions() -> PermissionSet {
    [Section::MyPanel].iter().map(|s| s.as_str().to_string()).collect()
}

/// Permissions handed to a freshly created admin.
pub fn default_admin_permissions() -> PermissionSet {
    [Section::Dashboard, Section::Approval, Section::Categories, Section::News, Section::Support]
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

/// Decides whether `role` holding `permissions` may open `section`.
///
/// Superadmins see everything. Support is open to every role. Everything
/// else requires the section id in the permission set; for `my-panel`
/// a reporter needs both the role and the grant, which the membership
/// test covers once the role is known.
pub fn can_access(role: Role, permissions: &PermissionSet, section: Section) -> bool {
    match (role, section) {
        (Role::Superadmin, _) => true,
        (_, Section::Support) => true,
        (Role::Admin | Role::Reporter, section) => permissions.contains(section.as_str()),
    }
}

/// The resolved set of sections for one account at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessList {
    pub role: Option<Role>,
    pub sections: BTreeSet<Section>,
}

impl AccessList {
    pub fn resolve(role: Role, permissions: &PermissionSet) -> Self {
        let sections = Section::ALL
            .iter()
            .copied()
            .filter(|section| can_access(role, permissions, *section))
            .collect();
        AccessList { role: Some(role), sections }
    }

    pub fn for_account(account: &Account) -> Self {
        Self::resolve(account.role, &account.permissions)
    }

    /// Used when role or permissions could not be loaded.
    pub fn deny_all() -> Self {
        AccessList { role: None, sections: BTreeSet::new() }
    }

    pub fn allows(&self, section: Section) -> bool {
        self.sections.contains(&section)
    }
}

/// Resolves access for an optional account; no account means no access.
pub fn resolve_for(account: Option<&Account>) -> AccessList {
    account.map(AccessList::for_account).unwrap_or_else(AccessList::deny_all)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Access denied: the '{section}' section is not available to this account.")]
pub struct AccessDenied {
    pub section: Section,
}

/// Gate for a single action inside a page.
pub fn require_section(account: &Account, section: Section) -> Result<(), AccessDenied> {
    if can_access(account.role, &account.permissions, section) {
        Ok(())
    } else {
        log::warn!("Account {} ({}) denied access to '{}'", account.id, account.role, section);
        Err(AccessDenied { section })
    }
}

/// Rejects permission strings that do not name a known section.
pub fn validate_permissions<'a, I>(permissions: I) -> Result<PermissionSet, String>
where
    I: IntoIterator<Item = &'a String>,
{
    permissions
        .into_iter()
        .map(|p| p.trim().parse::<Section>().map(|s| s.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(items: &[&str]) -> PermissionSet {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sections(items: &[Section]) -> BTreeSet<Section> {
        items.iter().copied().collect()
    }

    #[test]
    fn superadmin_sees_every_section_regardless_of_permissions() {
        for p in [perms(&[]), perms(&["news"]), perms(&["bogus"])] {
            let access = AccessList::resolve(Role::Superadmin, &p);
            assert_eq!(access.sections.len(), Section::ALL.len());
        }
    }

    #[test]
    fn admin_gets_support_plus_granted_sections() {
        let access = AccessList::resolve(Role::Admin, &perms(&["news", "approval", "bogus"]));
        assert_eq!(access.sections, sections(&[Section::News, Section::Approval, Section::Support]));

        let access = AccessList::resolve(Role::Admin, &perms(&[]));
        assert_eq!(access.sections, sections(&[Section::Support]));
    }

    #[test]
    fn reporter_needs_my_panel_grant() {
        let access = AccessList::resolve(Role::Reporter, &perms(&["news"]));
        assert!(!access.allows(Section::MyPanel));
        assert!(access.allows(Section::News));
        assert!(access.allows(Section::Support));

        let access = AccessList::resolve(Role::Reporter, &perms(&["my-panel"]));
        assert_eq!(access.sections, sections(&[Section::MyPanel, Section::Support]));
    }

    #[test]
    fn resolved_set_matches_formula_for_every_subset() {
        // Every subset of the ten sections, for every non-super role.
        for mask in 0u32..(1 << Section::ALL.len()) {
            let granted: PermissionSet = Section::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, s)| s.as_str().to_string())
                .collect();
            let mut expected: BTreeSet<Section> =
                granted.iter().map(|p| p.parse::<Section>().unwrap()).collect();
            expected.insert(Section::Support);

            for role in [Role::Admin, Role::Reporter] {
                assert_eq!(AccessList::resolve(role, &granted).sections, expected);
            }
        }
    }

    #[test]
    fn missing_account_denies_everything() {
        let access = resolve_for(None);
        assert!(access.sections.is_empty());
        assert!(!access.allows(Section::Support));
    }

    #[test]
    fn permission_validation_rejects_unknown_sections() {
        let ok = validate_permissions(&vec!["news".to_string(), " acl ".to_string()]).unwrap();
        assert_eq!(ok, perms(&["acl", "news"]));
        assert!(validate_permissions(&vec!["root".to_string()]).is_err());
    }

    #[test]
    fn section_names_round_trip_through_serde() {
        assert_eq!(serde_json::to_string(&Section::MyPanel).unwrap(), "\"my-panel\"");
        assert_eq!("my-panel".parse::<Section>(), Ok(Section::MyPanel));
    }
}
