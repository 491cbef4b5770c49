//! Closed enumerations for ticket fields.
//!
//! Values are stored as lowercase text columns and travel over the wire in
//! the same form. Parsing is case-insensitive and ignores surrounding
//! whitespace, so `"Billing "` and `"billing"` are the same category.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Implements text conversion, diesel `Text` mapping and `TryFrom<String>`
/// (used by serde) for a fieldless enum from its variant/name table.
macro_rules! text_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!("Unknown {}: {}", $label, s)),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;
            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(serialize::IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                value.parse().map_err(Into::into)
            }
        }
    };
}

// ============================================================================
// CATEGORY
// ============================================================================

/// Business area a ticket belongs to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Category {
    Billing,
    Technical,
    Account,
    General,
}

text_enum!(Category, "category", {
    Billing => "billing",
    Technical => "technical",
    Account => "account",
    General => "general",
});

// ============================================================================
// PRIORITY
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

text_enum!(Priority, "priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

// ============================================================================
// STATUS
// ============================================================================

/// Ticket lifecycle state
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Status {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl Default for Status {
    fn default() -> Self {
        Self::Open
    }
}

text_enum!(Status, "status", {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

/// Joins every variant's text form, e.g. `"low, medium, high, critical"`.
pub fn choices<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
