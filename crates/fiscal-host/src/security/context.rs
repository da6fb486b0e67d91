use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::domain::{
    Collective, CollectiveId, Expense, MemberRole, Membership, PayoutMethod, User,
};

/// Roles held by a profile, keyed by the collective they apply to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleSet {
    roles: HashMap<CollectiveId, HashSet<MemberRole>>,
}

impl RoleSet {
    /// Collect the roles held by `member` from a list of memberships.
    pub fn for_member<'a, I>(member: CollectiveId, memberships: I) -> Self
    where
        I: IntoIterator<Item = &'a Membership>,
    {
        let mut roles: HashMap<CollectiveId, HashSet<MemberRole>> = HashMap::new();
        for membership in memberships {
            if membership.member_collective_id == member {
                roles
                    .entry(membership.collective_id)
                    .or_default()
                    .insert(membership.role);
            }
        }
        Self { roles }
    }

    pub fn has_role(&self, collective_id: CollectiveId, role: MemberRole) -> bool {
        self.roles
            .get(&collective_id)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }
}

/// The submitting user with their memberships populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub user: User,
    pub roles: RoleSet,
}

impl Author {
    pub fn new(user: User, roles: RoleSet) -> Self {
        Self { user, roles }
    }

    pub fn has_two_factor_authentication(&self) -> bool {
        self.user.two_factor_enabled
    }

    /// True for the user's own profile or any collective they hold an admin role on.
    pub fn is_admin(&self, collective_id: CollectiveId) -> bool {
        self.user.collective_id == collective_id
            || self.roles.has_role(collective_id, MemberRole::Admin)
    }

    pub fn is_admin_of_collective(&self, collective: &Collective) -> bool {
        if self.is_admin(collective.id) {
            return true;
        }

        collective.inherits_parent_admins()
            && collective
                .parent_collective_id
                .map(|parent| self.is_admin(parent))
                .unwrap_or(false)
    }
}

/// An expense with every related entity the checks need already loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedExpense {
    pub expense: Expense,
    pub collective: Collective,
    pub from_collective: Collective,
    pub author: Author,
    pub payout_method: Option<PayoutMethod>,
}

impl ResolvedExpense {
    /// The fiscal host recorded on the expense, else the collective's current host.
    pub fn host_collective_id(&self) -> Option<CollectiveId> {
        self.expense
            .host_collective_id
            .or(self.collective.host_collective_id)
    }

    /// Authors administering the payee profile are the payee for check purposes.
    pub fn author_is_payee(&self) -> bool {
        self.author.is_admin_of_collective(&self.from_collective)
    }
}
