//! Who may do what on a tenant

use crate::infrastructure::entities::{Role, TenantRole};

/// Decides whether a user may perform an operation requiring `required` on a tenant.
///
/// Global admins pass unconditionally. Everyone else needs a membership in the tenant whose
/// role is at least `required`.
pub fn can_access_tenant(role: Role, membership: Option<TenantRole>, required: TenantRole) -> bool {
    match role {
        Role::Admin => true,
        Role::User => membership.is_some_and(|granted| granted >= required),
    }
}

pub fn is_global_admin(role: Role) -> bool {
    matches!(role, Role::Admin)
}
