//! Entity field registry: which fields of which entity are encrypted.
//!
//! Every known field of a registered entity falls into exactly one class:
//! sensitive (encrypted at rest), public (identifiers, enums, and reference
//! fields the store queries or joins on), or a nested container whose
//! elements are records of another entity type.

use crate::error::{FieldError, FieldResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity types whose records pass through the middleware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    JobApplication,
    ApplicationEvent,
    User,
}

const JOB_APPLICATION_SENSITIVE: &[&str] = &[
    "companyName",
    "position",
    "location",
    "salary",
    "jobUrl",
    "jobDescription",
    "notes",
    "contactName",
    "contactEmail",
    "contactPhone",
    "appliedDate",
    "createdAt",
    "updatedAt",
];
const JOB_APPLICATION_PUBLIC: &[&str] = &["id", "userId", "status", "priority", "source"];
const JOB_APPLICATION_NESTED: &[(&str, EntityType)] = &[("events", EntityType::ApplicationEvent)];

const APPLICATION_EVENT_SENSITIVE: &[&str] =
    &["title", "description", "date", "location", "notes", "createdAt"];
const APPLICATION_EVENT_PUBLIC: &[&str] = &["id", "applicationId", "type"];

const USER_SENSITIVE: &[&str] = &["name", "phone", "location", "bio", "targetRole"];
const USER_PUBLIC: &[&str] = &["id", "email", "passwordHash", "createdAt", "updatedAt"];

/// Decrypted values of these fields are restored as timestamps.
const TIMESTAMP_FIELDS: &[&str] = &["createdAt", "updatedAt"];

impl EntityType {
    pub const ALL: [EntityType; 3] = [
        EntityType::JobApplication,
        EntityType::ApplicationEvent,
        EntityType::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::JobApplication => "JobApplication",
            EntityType::ApplicationEvent => "ApplicationEvent",
            EntityType::User => "User",
        }
    }

    /// Fields encrypted at rest, in registry order.
    pub fn sensitive_fields(&self) -> &'static [&'static str] {
        match self {
            EntityType::JobApplication => JOB_APPLICATION_SENSITIVE,
            EntityType::ApplicationEvent => APPLICATION_EVENT_SENSITIVE,
            EntityType::User => USER_SENSITIVE,
        }
    }

    pub fn public_fields(&self) -> &'static [&'static str] {
        match self {
            EntityType::JobApplication => JOB_APPLICATION_PUBLIC,
            EntityType::ApplicationEvent => APPLICATION_EVENT_PUBLIC,
            EntityType::User => USER_PUBLIC,
        }
    }

    /// Container fields and the entity type of the records they hold.
    pub fn nested_fields(&self) -> &'static [(&'static str, EntityType)] {
        match self {
            EntityType::JobApplication => JOB_APPLICATION_NESTED,
            EntityType::ApplicationEvent | EntityType::User => &[],
        }
    }

    pub fn is_sensitive(&self, field: &str) -> bool {
        self.sensitive_fields().contains(&field)
    }

    /// Every field the registry knows for this type, across all classes.
    pub fn known_fields(&self) -> Vec<&'static str> {
        self.sensitive_fields()
            .iter()
            .chain(self.public_fields())
            .copied()
            .chain(self.nested_fields().iter().map(|(name, _)| *name))
            .collect()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| FieldError::UnknownEntityType(s.to_string()))
    }
}

/// Sensitive fields for an entity type tag.
pub fn fields_for(entity_type: &str) -> FieldResult<&'static [&'static str]> {
    Ok(entity_type.parse::<EntityType>()?.sensitive_fields())
}

pub fn nested_fields(entity_type: EntityType) -> &'static [(&'static str, EntityType)] {
    entity_type.nested_fields()
}

pub fn public_fields(entity_type: EntityType) -> &'static [&'static str] {
    entity_type.public_fields()
}

pub fn timestamp_fields() -> &'static [&'static str] {
    TIMESTAMP_FIELDS
}
