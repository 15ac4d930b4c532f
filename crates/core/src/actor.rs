//! Who caused an event.

use serde::{Deserialize, Serialize};

use crate::id::{EmailAddress, MemberNumber};

/// Privileged API credential kinds. Only the shared admin token exists today.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Admin,
}

/// Identity attributed to a committed event.
///
/// Embedded in every persisted event payload; authorization and the audit trail
/// are both keyed off it. How an `Actor` is obtained (sessions, magic links,
/// bearer tokens) is the transport's concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "lowercase")]
pub enum Actor {
    /// Background or automated work (imports, scheduled sync).
    System,
    /// A privileged API credential.
    Token { token: TokenKind },
    /// A signed-in member.
    User {
        #[serde(rename = "memberNumber")]
        member_number: MemberNumber,
        email: EmailAddress,
    },
}

impl Actor {
    pub fn admin_token() -> Self {
        Actor::Token {
            token: TokenKind::Admin,
        }
    }

    pub fn user(member_number: MemberNumber, email: EmailAddress) -> Self {
        Actor::User {
            member_number,
            email,
        }
    }

    /// Member number of a `User` actor.
    pub fn member_number(&self) -> Option<MemberNumber> {
        match self {
            Actor::User { member_number, .. } => Some(*member_number),
            _ => None,
        }
    }

    pub fn is_admin_token(&self) -> bool {
        matches!(self, Actor::Token { token: TokenKind::Admin })
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Actor::System)
    }
}
