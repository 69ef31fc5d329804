use crate::model::db::user::Role;

/// A marker type describing which roles an [`super::AuthToken`] must carry to
/// pass the request guard.
pub trait Rights: Send {
    /// Does the given role satisfy these rights?
    fn permits(role: Role) -> bool;
}

/// Any authenticated account.
pub enum AnyUser {}

impl Rights for AnyUser {
    fn permits(_: Role) -> bool {
        true
    }
}

/// Platform operators only.
pub enum SuperAdmin {}

impl Rights for SuperAdmin {
    fn permits(role: Role) -> bool {
        role == Role::Superadmin
    }
}
