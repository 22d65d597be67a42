//! Single authorization policy for every resource in the system.
//!
//! Handlers resolve the owner of a resource (the course instructor for
//! course-scoped content, the user for personal records) and ask
//! [`check_access`] whether the requester stands in the required relation.

use uuid::Uuid;

use crate::{
    model::error::{DatabaseError, DatabaseResult},
    web::{AuthenticatedUser, UserRole},
};

/// Something whose access is decided by a single owning user.
pub trait HasOwner {
    fn owner_id(&self) -> Uuid;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Administrators only.
    Admin,
    /// Administrators or the owner.
    Owner,
    /// Administrators, the owner, or the given subject (e.g. the enrolled student).
    OwnerOrSubject(Uuid),
    /// Administrators, the owner, or a requester whose membership was already established.
    OwnerOrMember { is_member: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

impl Access {
    pub fn is_allowed(self) -> bool {
        self == Access::Allow
    }
}

pub fn check_access(requester: &AuthenticatedUser, owner_id: Uuid, relation: Relation) -> Access {
    // admin can access all resources
    if requester.user_role() == UserRole::Admin {
        return Access::Allow;
    }

    let is_owner = requester.user_id() == owner_id;
    let allowed = match relation {
        Relation::Admin => false,
        Relation::Owner => is_owner,
        Relation::OwnerOrSubject(subject) => is_owner || requester.user_id() == subject,
        Relation::OwnerOrMember { is_member } => is_owner || is_member,
    };

    if allowed { Access::Allow } else { Access::Deny }
}

/// [`check_access`] against a resource, mapping a denial to [`DatabaseError::Forbidden`].
pub fn authorize<T: HasOwner + ?Sized>(
    requester: &AuthenticatedUser,
    resource: &T,
    relation: Relation,
) -> DatabaseResult<()> {
    match check_access(requester, resource.owner_id(), relation) {
        Access::Allow => Ok(()),
        Access::Deny => Err(DatabaseError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Owned(Uuid);

    impl HasOwner for Owned {
        fn owner_id(&self) -> Uuid {
            self.0
        }
    }

    fn user(role: UserRole) -> AuthenticatedUser {
        AuthenticatedUser::new(Uuid::new_v4(), role)
    }

    #[test]
    fn admin_passes_every_relation() {
        let admin = user(UserRole::Admin);
        let owner = Uuid::new_v4();
        for relation in [
            Relation::Admin,
            Relation::Owner,
            Relation::OwnerOrSubject(Uuid::new_v4()),
            Relation::OwnerOrMember { is_member: false },
        ] {
            assert_eq!(check_access(&admin, owner, relation), Access::Allow);
        }
    }

    #[test]
    fn owner_relation() {
        let instructor = user(UserRole::Instructor);
        let other = user(UserRole::Instructor);
        assert!(check_access(&instructor, instructor.user_id(), Relation::Owner).is_allowed());
        assert_eq!(
            check_access(&other, instructor.user_id(), Relation::Owner),
            Access::Deny
        );
    }

    #[test]
    fn owner_cannot_pass_admin_relation() {
        let instructor = user(UserRole::Instructor);
        assert_eq!(
            check_access(&instructor, instructor.user_id(), Relation::Admin),
            Access::Deny
        );
    }

    #[test]
    fn subject_relation_admits_the_subject_only() {
        let owner = Uuid::new_v4();
        let student = user(UserRole::Student);
        let stranger = user(UserRole::Student);
        let relation = Relation::OwnerOrSubject(student.user_id());

        assert!(check_access(&student, owner, relation).is_allowed());
        assert!(!check_access(&stranger, owner, relation).is_allowed());
    }

    #[test]
    fn member_relation() {
        let owner = Uuid::new_v4();
        let student = user(UserRole::Student);
        assert!(check_access(&student, owner, Relation::OwnerOrMember { is_member: true }).is_allowed());
        assert!(!check_access(&student, owner, Relation::OwnerOrMember { is_member: false }).is_allowed());
    }

    #[test]
    fn authorize_maps_deny_to_forbidden() {
        let resource = Owned(Uuid::new_v4());
        let student = user(UserRole::Student);
        assert!(matches!(
            authorize(&student, &resource, Relation::Owner),
            Err(DatabaseError::Forbidden)
        ));
    }
}
