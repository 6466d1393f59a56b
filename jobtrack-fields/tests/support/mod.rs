//! Shared fixtures for field middleware integration tests.

#![allow(dead_code)]

use jobtrack_crypto::{FieldKey, KdfParams, KeyManager, derive_user_key};
use jobtrack_fields::{FieldCryptoConfig, FieldSession, Record};
use serde_json::json;

pub const PASSWORD: &str = "correct-horse";
pub const USER_ID: &str = "user-42";

/// The key a login with [`PASSWORD`] / [`USER_ID`] derives.
pub fn user_key() -> FieldKey {
    derive_user_key(PASSWORD, USER_ID, &KdfParams::default()).expect("derivation must succeed")
}

/// A job application with every sensitive field populated and two events.
pub fn full_application(id: &str) -> Record {
    Record::from_json(json!({
        "id": id,
        "userId": USER_ID,
        "status": "interviewing",
        "priority": "high",
        "source": "referral",
        "companyName": "Acme Corporation",
        "position": "Staff Engineer",
        "location": "Remote (EU)",
        "salary": "€95,000",
        "jobUrl": "https://acme.example/jobs/123",
        "jobDescription": "Build the billing platform.",
        "notes": "Recruiter mentioned a fast process.",
        "contactName": "Dana Smith",
        "contactEmail": "dana@acme.example",
        "contactPhone": "+44 20 7946 0000",
        "appliedDate": "2024-01-15",
        "events": [
            {
                "id": format!("{id}-ev-1"),
                "applicationId": id,
                "type": "interview",
                "title": "Phone screen",
                "description": "30 minutes with the hiring manager",
                "date": "2024-01-20",
            },
            {
                "id": format!("{id}-ev-2"),
                "applicationId": id,
                "type": "interview",
                "title": "Onsite",
                "description": "System design and coding",
                "date": "2024-02-02",
            },
        ],
    }))
    .expect("fixture is a JSON object")
}

/// A user profile with every field the app writes.
pub fn full_user(id: &str) -> Record {
    Record::from_json(json!({
        "id": id,
        "email": "sam@example.com",
        "passwordHash": "$2b$12$Q9b1uYk3m1Zb2a9yV2nE7eWq0t5P6m1zXcVbNmLkJhGfDsAqWeRtY",
        "createdAt": "2024-01-02T10:00:00.000Z",
        "updatedAt": "2024-03-04T12:30:00.000Z",
        "name": "Sam Rivera",
        "phone": "+1 555 0100",
        "location": "Lisbon",
        "bio": "Backend engineer moving into platform work.",
        "targetRole": "Platform Engineer",
    }))
    .expect("fixture is a JSON object")
}

/// Config with the default policy and volatile key storage.
pub fn test_config() -> FieldCryptoConfig {
    FieldCryptoConfig::default()
}

pub fn volatile_session() -> FieldSession {
    FieldSession::new(KeyManager::volatile(), test_config())
}
