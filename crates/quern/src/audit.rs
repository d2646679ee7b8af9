use crate::{
    row::Row,
    schema::{AUDIT_CREATED_AT, AUDIT_CREATED_BY, AUDIT_UPDATED_AT, AUDIT_UPDATED_BY},
    value::Value,
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// Actor
///
/// The identity performing a write. Always passed explicitly through the
/// call chain; there is no ambient or thread-local current user.
///

#[derive(Clone, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
pub enum Actor {
    /// A named principal, stamped into audit columns verbatim.
    #[display("{_0}")]
    User(String),

    /// Non-interactive writes (migrations, scheduled jobs).
    #[display("system")]
    System,
}

impl Actor {
    #[must_use]
    pub fn user(name: impl Into<String>) -> Self {
        Self::User(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::User(name) => name,
            Self::System => "system",
        }
    }
}

///
/// AuditStamp
///
/// Who and when, captured once per engine operation so every row touched
/// by one bulk write carries the same timestamp.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuditStamp {
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

impl AuditStamp {
    #[must_use]
    pub fn now(actor: Actor) -> Self {
        Self {
            actor,
            at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn at(actor: Actor, at: DateTime<Utc>) -> Self {
        Self { actor, at }
    }

    /// The `updated_by` / `updated_at` assignments for a bulk update.
    #[must_use]
    pub fn update_fields(&self) -> Vec<(String, Value)> {
        vec![
            (
                AUDIT_UPDATED_BY.to_string(),
                Value::Text(self.actor.as_str().to_string()),
            ),
            (AUDIT_UPDATED_AT.to_string(), Value::Timestamp(self.at)),
        ]
    }

    /// All four audit assignments for a freshly created row.
    #[must_use]
    pub fn create_fields(&self) -> Vec<(String, Value)> {
        let mut fields = vec![
            (
                AUDIT_CREATED_BY.to_string(),
                Value::Text(self.actor.as_str().to_string()),
            ),
            (AUDIT_CREATED_AT.to_string(), Value::Timestamp(self.at)),
        ];
        fields.extend(self.update_fields());
        fields
    }

    /// Stamp creation audit fields onto a row.
    #[must_use]
    pub fn stamp_created(&self, mut row: Row) -> Row {
        for (name, value) in self.create_fields() {
            row = row.with(name, value);
        }
        row
    }
}

///
/// TESTS
///
