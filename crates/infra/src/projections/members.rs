//! Member details read model (full replay).
//!
//! A member appears once their number is linked to an email or their details
//! are updated. Linking a new email keeps the old ones for lookups.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use workshop_core::{EmailAddress, MemberNumber};
use workshop_events::{DomainEvent, Projection, RecordedEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_number: MemberNumber,
    /// Most recently linked email.
    pub email: Option<EmailAddress>,
    pub past_emails: BTreeSet<EmailAddress>,
    pub name: Option<String>,
    pub pronouns: Option<String>,
}

impl Member {
    fn new(member_number: MemberNumber) -> Self {
        Self {
            member_number,
            email: None,
            past_emails: BTreeSet::new(),
            name: None,
            pronouns: None,
        }
    }

    pub fn has_email(&self, email: &EmailAddress) -> bool {
        self.email.as_ref() == Some(email) || self.past_emails.contains(email)
    }
}

pub struct Members;

impl Projection for Members {
    type State = BTreeMap<MemberNumber, Member>;

    fn handles(event: &DomainEvent) -> bool {
        matches!(
            event,
            DomainEvent::MemberNumberLinkedToEmail(_) | DomainEvent::MemberDetailsUpdated(_)
        )
    }

    fn reduce(state: &mut Self::State, event: &RecordedEvent) {
        match &event.event {
            DomainEvent::MemberNumberLinkedToEmail(e) => {
                let member = state
                    .entry(e.member_number)
                    .or_insert_with(|| Member::new(e.member_number));
                if let Some(previous) = member.email.replace(e.email.clone()) {
                    if previous != e.email {
                        member.past_emails.insert(previous);
                    }
                }
                member.past_emails.remove(&e.email);
            }
            DomainEvent::MemberDetailsUpdated(e) => {
                let member = state
                    .entry(e.member_number)
                    .or_insert_with(|| Member::new(e.member_number));
                if let Some(name) = &e.name {
                    member.name = Some(name.clone());
                }
                if let Some(pronouns) = &e.pronouns {
                    member.pronouns = Some(pronouns.clone());
                }
            }
            _ => {}
        }
    }
}

pub fn get(events: &[RecordedEvent], member_number: MemberNumber) -> Option<Member> {
    Members::replay(events).remove(&member_number)
}

pub fn get_all(events: &[RecordedEvent]) -> Vec<Member> {
    Members::replay(events).into_values().collect()
}

/// Member whose current or past email matches.
pub fn find_by_email(events: &[RecordedEvent], email: &EmailAddress) -> Option<Member> {
    Members::replay(events)
        .into_values()
        .find(|m| m.has_email(email))
}
