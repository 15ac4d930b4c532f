//! Resource addressing and optimistic concurrency tokens.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{AreaId, EquipmentId, MemberNumber};

/// Kind of independently versioned event stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Area,
    Equipment,
    SuperUser,
    MemberDetails,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Area => "Area",
            ResourceType::Equipment => "Equipment",
            ResourceType::SuperUser => "SuperUser",
            ResourceType::MemberDetails => "MemberDetails",
        }
    }
}

impl core::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Area" => Ok(ResourceType::Area),
            "Equipment" => Ok(ResourceType::Equipment),
            "SuperUser" => Ok(ResourceType::SuperUser),
            "MemberDetails" => Ok(ResourceType::MemberDetails),
            other => Err(DomainError::invalid_id(format!("unknown resource type '{other}'"))),
        }
    }
}

/// A `(type, id)` pair naming one append-only stream.
///
/// Events within a resource are totally ordered; nothing is promised across
/// resources.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub id: String,
}

impl Resource {
    pub fn new(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self {
            resource_type,
            id: id.into(),
        }
    }

    pub fn area(id: AreaId) -> Self {
        Self::new(ResourceType::Area, id.to_string())
    }

    pub fn equipment(id: EquipmentId) -> Self {
        Self::new(ResourceType::Equipment, id.to_string())
    }

    pub fn super_user(member_number: MemberNumber) -> Self {
        Self::new(ResourceType::SuperUser, member_number.to_string())
    }

    pub fn member_details(member_number: MemberNumber) -> Self {
        Self::new(ResourceType::MemberDetails, member_number.to_string())
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// Concurrency token for a resource.
///
/// `Committed(n)` means `n >= 1` events have been committed; the `n`th event
/// carries version `n`. A commit must state the version it believes is current.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceVersion {
    /// Nothing has been committed to the resource yet.
    NoSuchResource,
    Committed(u64),
}

impl ResourceVersion {
    /// Version for a resource holding `count` events.
    pub fn from_event_count(count: u64) -> Self {
        if count == 0 {
            ResourceVersion::NoSuchResource
        } else {
            ResourceVersion::Committed(count)
        }
    }

    pub fn event_count(self) -> u64 {
        match self {
            ResourceVersion::NoSuchResource => 0,
            ResourceVersion::Committed(n) => n,
        }
    }

    /// Version carried by the next event appended after this one.
    pub fn next(self) -> u64 {
        self.event_count() + 1
    }

    pub fn exists(self) -> bool {
        matches!(self, ResourceVersion::Committed(_))
    }

    /// Compare an expected version against the stored one.
    pub fn check(self, actual: ResourceVersion) -> DomainResult<()> {
        if self == actual {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self}, actual: {actual})"
            )))
        }
    }
}

impl core::fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ResourceVersion::NoSuchResource => f.write_str("no-such-resource"),
            ResourceVersion::Committed(n) => write!(f, "{n}"),
        }
    }
}
