use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepartmentId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: UserId,
    pub display_name: String,
    pub role: String,
    pub active: bool,
    pub company_id: Option<CompanyId>,
    pub region_id: Option<RegionId>,
    pub branch_id: Option<BranchId>,
}

impl DirectoryUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.trim().eq_ignore_ascii_case(role.trim())
    }

    pub fn within(&self, scope: &ScopeFilter) -> bool {
        match scope {
            ScopeFilter::Branch(branch_id) => self.branch_id == Some(*branch_id),
            ScopeFilter::Company(company_id) => self.company_id == Some(*company_id),
            ScopeFilter::Region(region_id) => self.region_id == Some(*region_id),
        }
    }
}

/// Foreign-key equality filter applied to non-centralized roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ScopeFilter {
    Branch(BranchId),
    Company(CompanyId),
    Region(RegionId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateQuery {
    pub role: String,
    pub exclude_user: Option<UserId>,
    pub scope: Option<ScopeFilter>,
}

impl CandidateQuery {
    pub fn for_role(role: impl Into<String>) -> Self {
        Self { role: role.into(), exclude_user: None, scope: None }
    }

    pub fn excluding(mut self, user_id: UserId) -> Self {
        self.exclude_user = Some(user_id);
        self
    }

    pub fn scoped(mut self, scope: Option<ScopeFilter>) -> Self {
        self.scope = scope;
        self
    }

    pub fn matches(&self, user: &DirectoryUser) -> bool {
        user.active
            && user.has_role(&self.role)
            && self.exclude_user != Some(user.id)
            && self.scope.as_ref().map_or(true, |scope| user.within(scope))
    }
}
