//! Session identity.
//!
//! The signed-in principal is stored as an explicit tagged value,
//! `{"kind":"User","id":7}` or `{"kind":"Admin","id":2}`.

use serde::{Deserialize, Serialize};

use greenbasket_core::types::{AdminUserId, UserId};

/// Which kind of account a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityKind {
    User,
    Admin,
}

impl IdentityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Admin => "Admin",
        }
    }
}

/// Session-stored identity of the signed-in principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub kind: IdentityKind,
    pub id: i32,
}

impl SessionIdentity {
    #[must_use]
    pub const fn user(id: UserId) -> Self {
        Self {
            kind: IdentityKind::User,
            id: id.as_i32(),
        }
    }

    #[must_use]
    pub const fn admin(id: AdminUserId) -> Self {
        Self {
            kind: IdentityKind::Admin,
            id: id.as_i32(),
        }
    }

    /// The shopper id, if this is a shopper session.
    #[must_use]
    pub const fn as_user(self) -> Option<UserId> {
        match self.kind {
            IdentityKind::User => Some(UserId::new(self.id)),
            IdentityKind::Admin => None,
        }
    }

    /// The admin id, if this is an admin session.
    #[must_use]
    pub const fn as_admin(self) -> Option<AdminUserId> {
        match self.kind {
            IdentityKind::Admin => Some(AdminUserId::new(self.id)),
            IdentityKind::User => None,
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for the signed-in identity.
    pub const IDENTITY: &str = "identity";
}
