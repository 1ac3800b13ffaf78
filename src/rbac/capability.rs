use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Roles that bypass the permission table entirely.
pub const ADMIN_TIER_ROLES: [&str; 3] = ["Super Administrator", "School Administrator", "Administrator"];

/// Dotted permission name such as `students.read` or `students.read.own`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `students.read.children` -> `students.read`. `None` for one-segment names.
    pub fn base(&self) -> Option<Capability> {
        self.0.rsplit_once('.').map(|(base, _)| Capability::new(base))
    }

    /// True for `<family>.children` / `<family>.own` style qualifiers.
    pub fn has_qualifier(&self, qualifier: &str) -> bool {
        self.0
            .rsplit_once('.')
            .map(|(_, last)| last == qualifier)
            .unwrap_or(false)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(value: &str) -> Self {
        Capability::new(value)
    }
}

/// Role name. Matching is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin_tier(&self) -> bool {
        ADMIN_TIER_ROLES.contains(&self.0.as_str())
    }

    pub fn restricted(&self) -> Option<RestrictedRole> {
        match self.0.as_str() {
            "Teacher" => Some(RestrictedRole::Teacher),
            "Parent" => Some(RestrictedRole::Parent),
            "Student" => Some(RestrictedRole::Student),
            _ => None,
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleName {
    fn from(value: &str) -> Self {
        RoleName::new(value)
    }
}

/// Roles whose row visibility is narrowed by a scoping relation.
///
/// Declaration order is evaluation order: the broadest scope comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RestrictedRole {
    Teacher,
    Parent,
    Student,
}

impl RestrictedRole {
    /// Qualifier a capability must carry for this role to see any rows.
    pub fn scoping_qualifier(self) -> Option<&'static str> {
        match self {
            RestrictedRole::Teacher => None,
            RestrictedRole::Parent => Some("children"),
            RestrictedRole::Student => Some("own"),
        }
    }
}

/// Which kind of rows the handler is about to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordScope {
    /// Verb-level check only; no row narrowing.
    #[default]
    Unscoped,
    Students,
    Classes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Needs {
    AnyPermission(BTreeSet<Capability>),
    AnyRole(BTreeSet<RoleName>),
}

/// What a handler declares it needs. Built once, reused for every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub needs: Needs,
    pub resource_type: String,
    pub records: RecordScope,
}

impl Requirement {
    pub fn permissions<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            needs: Needs::AnyPermission(names.into_iter().map(Capability::new).collect()),
            resource_type: String::new(),
            records: RecordScope::Unscoped,
        }
    }

    pub fn roles<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            needs: Needs::AnyRole(names.into_iter().map(RoleName::new).collect()),
            resource_type: String::new(),
            records: RecordScope::Unscoped,
        }
    }

    pub fn on(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    pub fn scoped_to(mut self, records: RecordScope) -> Self {
        self.records = records;
        self
    }

    /// Flat list of the required names, for audit payloads.
    pub fn required_names(&self) -> Vec<String> {
        match &self.needs {
            Needs::AnyPermission(caps) => caps.iter().map(|c| c.to_string()).collect(),
            Needs::AnyRole(roles) => roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_base_and_qualifier() {
        let cap = Capability::new("students.read.children");
        assert_eq!(cap.base(), Some(Capability::new("students.read")));
        assert!(cap.has_qualifier("children"));
        assert!(!cap.has_qualifier("own"));
        assert_eq!(Capability::new("reports").base(), None);
    }

    #[test]
    fn role_names_are_case_sensitive() {
        assert!(RoleName::new("Administrator").is_admin_tier());
        assert!(!RoleName::new("administrator").is_admin_tier());
        assert_eq!(RoleName::new("teacher").restricted(), None);
        assert_eq!(RoleName::new("Teacher").restricted(), Some(RestrictedRole::Teacher));
    }

    #[test]
    fn requirement_builder() {
        let req = Requirement::permissions(["students.read", "students.read.own"])
            .on("student")
            .scoped_to(RecordScope::Students);
        assert_eq!(req.resource_type, "student");
        assert_eq!(req.records, RecordScope::Students);
        assert_eq!(req.required_names(), vec!["students.read", "students.read.own"]);
    }
}
