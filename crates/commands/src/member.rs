//! Member identity and self-service details.

use serde_json::Value as JsonValue;

use workshop_auth::is_self_or_privileged;
use workshop_core::{Actor, EmailAddress, MemberNumber, Resource, ValidationError};
use workshop_events::{Command, DomainEvent, MemberDetailsUpdated, MemberNumberLinkedToEmail};

use crate::input::{InputReader, parse};

/// Command: LinkNumberToEmail. Raised by membership imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNumberToEmail {
    pub member_number: MemberNumber,
    pub email: EmailAddress,
}

impl Command for LinkNumberToEmail {
    const NAME: &'static str = "member.link_number_to_email";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        let mut r = InputReader::new(input);
        let member_number = r.required("memberNumber", parse::member_number);
        let email = r.required("email", parse::email);
        r.build(|| {
            Some(Self {
                member_number: member_number?,
                email: email?,
            })
        })
    }

    fn resource(&self) -> Resource {
        Resource::member_details(self.member_number)
    }

    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        let current = history.iter().rev().find_map(|e| match e {
            DomainEvent::MemberNumberLinkedToEmail(l) if l.member_number == self.member_number => {
                Some(&l.email)
            }
            _ => None,
        });
        if current == Some(&self.email) {
            return None;
        }
        Some(DomainEvent::MemberNumberLinkedToEmail(MemberNumberLinkedToEmail {
            member_number: self.member_number,
            email: self.email.clone(),
        }))
    }

    fn is_authorized(&self, actor: &Actor, _events: &[DomainEvent]) -> bool {
        actor.is_admin_token() || actor.is_system()
    }
}

/// Command: UpdateMemberDetails. Omitted fields are left as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMemberDetails {
    pub member_number: MemberNumber,
    pub name: Option<String>,
    pub pronouns: Option<String>,
}

impl Command for UpdateMemberDetails {
    const NAME: &'static str = "member.update_details";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        let mut r = InputReader::new(input);
        let member_number = r.required("memberNumber", parse::member_number);
        let name = r.optional("name", parse::text);
        let pronouns = r.optional("pronouns", parse::text);
        if input.is_object() && name.is_none() && pronouns.is_none() {
            r.reject("name", "name or pronouns is required");
        }
        r.build(|| {
            Some(Self {
                member_number: member_number?,
                name,
                pronouns,
            })
        })
    }

    fn resource(&self) -> Resource {
        Resource::member_details(self.member_number)
    }

    /// Raises only the fields that differ from the current details.
    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        let mut name: Option<&str> = None;
        let mut pronouns: Option<&str> = None;
        for event in history {
            if let DomainEvent::MemberDetailsUpdated(u) = event {
                if u.member_number != self.member_number {
                    continue;
                }
                if let Some(n) = &u.name {
                    name = Some(n.as_str());
                }
                if let Some(p) = &u.pronouns {
                    pronouns = Some(p.as_str());
                }
            }
        }

        let changed_name = self.name.clone().filter(|n| Some(n.as_str()) != name);
        let changed_pronouns = self.pronouns.clone().filter(|p| Some(p.as_str()) != pronouns);
        if changed_name.is_none() && changed_pronouns.is_none() {
            return None;
        }
        Some(DomainEvent::MemberDetailsUpdated(MemberDetailsUpdated {
            member_number: self.member_number,
            name: changed_name,
            pronouns: changed_pronouns,
        }))
    }

    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool {
        is_self_or_privileged(actor, self.member_number, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn member(n: u64) -> Actor {
        Actor::user(
            MemberNumber::new(n),
            EmailAddress::parse(&format!("m{n}@example.com")).unwrap(),
        )
    }

    #[test]
    fn relinking_same_email_is_a_no_op() {
        let cmd = LinkNumberToEmail {
            member_number: MemberNumber::new(1),
            email: EmailAddress::parse("a@example.com").unwrap(),
        };
        let ev = cmd.process(&Actor::System, &[]).unwrap();
        assert_eq!(cmd.process(&Actor::System, &[ev.clone()]), None);

        let other = LinkNumberToEmail {
            email: EmailAddress::parse("b@example.com").unwrap(),
            ..cmd.clone()
        };
        assert!(other.process(&Actor::System, &[ev]).is_some());
    }

    #[test]
    fn update_details_emits_only_changes() {
        let n = MemberNumber::new(8);
        let history = vec![DomainEvent::MemberDetailsUpdated(MemberDetailsUpdated {
            member_number: n,
            name: Some("Sam".to_string()),
            pronouns: Some("they/them".to_string()),
        })];

        let same = UpdateMemberDetails {
            member_number: n,
            name: Some("Sam".to_string()),
            pronouns: None,
        };
        assert_eq!(same.process(&member(8), &history), None);

        let renamed = UpdateMemberDetails {
            member_number: n,
            name: Some("Samira".to_string()),
            pronouns: Some("they/them".to_string()),
        };
        assert_eq!(
            renamed.process(&member(8), &history),
            Some(DomainEvent::MemberDetailsUpdated(MemberDetailsUpdated {
                member_number: n,
                name: Some("Samira".to_string()),
                pronouns: None,
            }))
        );
    }

    #[test]
    fn update_details_needs_a_field() {
        let err = UpdateMemberDetails::decode(&json!({"memberNumber": 3})).unwrap_err();
        assert_eq!(err.field_names(), vec!["name"]);
    }

    #[test]
    fn members_may_only_update_themselves() {
        let cmd = UpdateMemberDetails {
            member_number: MemberNumber::new(8),
            name: Some("Sam".to_string()),
            pronouns: None,
        };
        assert!(cmd.is_authorized(&member(8), &[]));
        assert!(!cmd.is_authorized(&member(9), &[]));
        assert!(cmd.is_authorized(&Actor::admin_token(), &[]));
    }

    #[test]
    fn only_imports_link_emails() {
        let cmd = LinkNumberToEmail {
            member_number: MemberNumber::new(1),
            email: EmailAddress::parse("a@example.com").unwrap(),
        };
        assert!(cmd.is_authorized(&Actor::System, &[]));
        assert!(!cmd.is_authorized(&member(1), &[]));
    }
}
