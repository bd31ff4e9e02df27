//! Caller identity and role gates.
//!
//! Token issuance and verification are owned by the external identity
//! service; by the time a request reaches this crate it has been resolved to
//! an [`Identity`]. Services take the identity by reference and apply role
//! gates before mutating anything. A failed gate is [`Error::Forbidden`];
//! the 401 mapping for missing or invalid tokens belongs to the HTTP host.

use crate::{
    entities::Role,
    errors::{Error, Result},
};

/// Resolved caller: who is acting and with which role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// The authenticated user's id
    pub user_id: i64,
    /// The authenticated user's role
    pub role: Role,
}

impl Identity {
    /// Creates an identity for the given user and role.
    #[must_use]
    pub const fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Requires the admin role.
    pub fn require_admin(&self) -> Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(Error::Forbidden {
                message: "Admin access required".to_string(),
            })
        }
    }

    /// Requires the teacher role; admins pass as well.
    pub fn require_teacher(&self) -> Result<()> {
        if matches!(self.role, Role::Teacher | Role::Admin) {
            Ok(())
        } else {
            Err(Error::Forbidden {
                message: "Teacher access required".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_admin_gate() {
        assert!(Identity::new(1, Role::Admin).require_admin().is_ok());
        for role in [Role::Parent, Role::Student, Role::Teacher] {
            let result = Identity::new(1, role).require_admin();
            assert!(matches!(result.unwrap_err(), Error::Forbidden { .. }));
        }
    }

    #[test]
    fn test_teacher_gate_admits_admins() {
        assert!(Identity::new(1, Role::Teacher).require_teacher().is_ok());
        assert!(Identity::new(1, Role::Admin).require_teacher().is_ok());
        for role in [Role::Parent, Role::Student] {
            let result = Identity::new(1, role).require_teacher();
            assert!(matches!(result.unwrap_err(), Error::Forbidden { .. }));
        }
    }
}
