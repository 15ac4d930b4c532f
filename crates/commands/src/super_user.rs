//! Super-user declaration and revocation.

use serde_json::Value as JsonValue;

use workshop_auth::{facts, is_admin_or_super_user};
use workshop_core::{Actor, MemberNumber, Resource, ValidationError};
use workshop_events::{Command, DomainEvent, SuperUserDeclared, SuperUserRevoked};

use crate::input::{InputReader, parse};

fn decode_member(input: &JsonValue) -> Result<MemberNumber, ValidationError> {
    let mut r = InputReader::new(input);
    let member_number = r.required("memberNumber", parse::member_number);
    r.build(|| member_number)
}

/// Command: DeclareSuperUser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclareSuperUser {
    pub member_number: MemberNumber,
}

impl Command for DeclareSuperUser {
    const NAME: &'static str = "super_user.declare";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        decode_member(input).map(|member_number| Self { member_number })
    }

    fn resource(&self) -> Resource {
        Resource::super_user(self.member_number)
    }

    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        (!facts::is_super_user(history, self.member_number)).then(|| {
            DomainEvent::SuperUserDeclared(SuperUserDeclared {
                member_number: self.member_number,
            })
        })
    }

    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool {
        is_admin_or_super_user(actor, events)
    }
}

/// Command: RevokeSuperUser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeSuperUser {
    pub member_number: MemberNumber,
}

impl Command for RevokeSuperUser {
    const NAME: &'static str = "super_user.revoke";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        decode_member(input).map(|member_number| Self { member_number })
    }

    fn resource(&self) -> Resource {
        Resource::super_user(self.member_number)
    }

    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        facts::is_super_user(history, self.member_number).then(|| {
            DomainEvent::SuperUserRevoked(SuperUserRevoked {
                member_number: self.member_number,
            })
        })
    }

    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool {
        is_admin_or_super_user(actor, events)
    }
}
