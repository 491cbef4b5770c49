use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::core::shared::enums::{choices, Category, Priority, Status};
use crate::core::shared::schema::tickets;
use crate::tickets::classifier::Classification;
use crate::tickets::error::{FieldErrors, TicketsError};

pub const TITLE_MAX_CHARS: usize = 200;

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable,
)]
#[diesel(table_name = tickets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Materialises a validated creation request with a fresh id and timestamp.
    pub fn from_new(new: NewTicket, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            category: new.category,
            priority: new.priority,
            status: new.status,
            created_at,
        }
    }
}

/// Validated fields for a ticket about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub status: Status,
}

/// Validated partial update. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = tickets)]
pub struct TicketChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Option<Category>>,
    pub priority: Option<Option<Priority>>,
    pub status: Option<Status>,
}

impl TicketChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.status.is_none()
    }

    pub fn apply(&self, ticket: &mut Ticket) {
        if let Some(title) = &self.title {
            ticket.title = title.clone();
        }
        if let Some(description) = &self.description {
            ticket.description = description.clone();
        }
        if let Some(category) = self.category {
            ticket.category = category;
        }
        if let Some(priority) = self.priority {
            ticket.priority = priority;
        }
        if let Some(status) = self.status {
            ticket.status = status;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

impl CreateTicketRequest {
    pub fn validate(self) -> Result<NewTicket, TicketsError> {
        let mut errors = FieldErrors::new();

        let title = required(&mut errors, "title", self.title)
            .and_then(|t| check_title(&mut errors, t));
        let description = required(&mut errors, "description", self.description)
            .and_then(|d| not_blank(&mut errors, "description", d));
        let category = optional_choice(&mut errors, "category", self.category, Category::ALL);
        let priority = optional_choice(&mut errors, "priority", self.priority, Priority::ALL);
        let status = match self.status {
            Some(raw) => choice(&mut errors, "status", &raw, Status::ALL),
            None => Some(Status::default()),
        };

        match (title, description, status) {
            (Some(title), Some(description), Some(status)) if errors.is_empty() => {
                Ok(NewTicket {
                    title,
                    description,
                    category,
                    priority,
                    status,
                })
            }
            _ => Err(TicketsError::Validation(errors)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub priority: Option<Option<String>>,
    pub status: Option<String>,
}

impl UpdateTicketRequest {
    /// `full` is a PUT: title and description must be present.
    pub fn validate(self, full: bool) -> Result<TicketChanges, TicketsError> {
        let mut errors = FieldErrors::new();

        if full {
            if self.title.is_none() {
                errors.add("title", "This field is required.");
            }
            if self.description.is_none() {
                errors.add("description", "This field is required.");
            }
        }

        let changes = TicketChanges {
            title: self.title.and_then(|t| check_title(&mut errors, t)),
            description: self
                .description
                .and_then(|d| not_blank(&mut errors, "description", d)),
            category: self
                .category
                .map(|c| optional_choice(&mut errors, "category", c, Category::ALL)),
            priority: self
                .priority
                .map(|p| optional_choice(&mut errors, "priority", p, Priority::ALL)),
            status: self
                .status
                .and_then(|s| choice(&mut errors, "status", &s, Status::ALL)),
        };

        errors.into_result(changes)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

/// Exact-match filters plus search terms; every term must appear in the
/// title or the description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketFilter {
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub search_terms: Vec<String>,
}

impl TicketFilter {
    pub fn from_query(query: ListQuery) -> Result<Self, TicketsError> {
        let mut errors = FieldErrors::new();

        let filter = TicketFilter {
            category: optional_choice(&mut errors, "category", query.category, Category::ALL),
            priority: optional_choice(&mut errors, "priority", query.priority, Priority::ALL),
            status: optional_choice(&mut errors, "status", query.status, Status::ALL),
            search_terms: query
                .search
                .map(|s| {
                    s.split(|c: char| c.is_whitespace() || c == ',')
                        .filter(|term| !term.is_empty())
                        .map(str::to_lowercase)
                        .collect()
                })
                .unwrap_or_default(),
        };

        errors.into_result(filter)
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        if self.category.is_some_and(|c| ticket.category != Some(c)) {
            return false;
        }
        if self.priority.is_some_and(|p| ticket.priority != Some(p)) {
            return false;
        }
        if self.status.is_some_and(|s| ticket.status != s) {
            return false;
        }
        let title = ticket.title.to_lowercase();
        let description = ticket.description.to_lowercase();
        self.search_terms
            .iter()
            .all(|term| title.contains(term.as_str()) || description.contains(term.as_str()))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub suggested_category: Option<Category>,
    pub suggested_priority: Option<Priority>,
}

impl ClassifyResponse {
    pub fn empty() -> Self {
        Self {
            suggested_category: None,
            suggested_priority: None,
        }
    }
}

impl From<Classification> for ClassifyResponse {
    fn from(c: Classification) -> Self {
        Self {
            suggested_category: Some(c.suggested_category),
            suggested_priority: Some(c.suggested_priority),
        }
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn required(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    if value.is_none() {
        errors.add(field, "This field is required.");
    }
    value
}

fn not_blank(errors: &mut FieldErrors, field: &str, value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, "This field may not be blank.");
        return None;
    }
    Some(trimmed.to_string())
}

fn check_title(errors: &mut FieldErrors, value: String) -> Option<String> {
    let title = not_blank(errors, "title", value)?;
    if title.chars().count() > TITLE_MAX_CHARS {
        errors.add(
            "title",
            format!("Ensure this field has no more than {TITLE_MAX_CHARS} characters."),
        );
        return None;
    }
    Some(title)
}

fn choice<T>(errors: &mut FieldErrors, field: &str, raw: &str, all: &[T]) -> Option<T>
where
    T: FromStr + std::fmt::Display,
{
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.add(
                field,
                format!(
                    "\"{raw}\" is not a valid choice. Expected one of: {}.",
                    choices(all)
                ),
            );
            None
        }
    }
}

/// Absent or blank means unset.
fn optional_choice<T>(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<String>,
    all: &[T],
) -> Option<T>
where
    T: FromStr + std::fmt::Display,
{
    match raw {
        Some(raw) if !raw.trim().is_empty() => choice(errors, field, &raw, all),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(title: &str, description: &str) -> Ticket {
        Ticket::from_new(
            NewTicket {
                title: title.to_string(),
                description: description.to_string(),
                category: Some(Category::Billing),
                priority: Some(Priority::High),
                status: Status::Open,
            },
            Utc::now(),
        )
    }

    fn validation_fields(err: TicketsError) -> FieldErrors {
        match err {
            TicketsError::Validation(fields) => fields,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_create_defaults_status_to_open() {
        let new = CreateTicketRequest {
            title: Some("  Refund  ".to_string()),
            description: Some("I was charged twice".to_string()),
            category: Some("billing".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();

        assert_eq!(new.title, "Refund");
        assert_eq!(new.status, Status::Open);
        assert_eq!(new.category, Some(Category::Billing));
        assert_eq!(new.priority, None);
    }

    #[test]
    fn test_create_reports_every_bad_field() {
        let err = CreateTicketRequest {
            title: None,
            description: Some("   ".to_string()),
            priority: Some("urgent".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();

        let fields = validation_fields(err);
        assert_eq!(fields.get("title").unwrap(), ["This field is required."]);
        assert_eq!(
            fields.get("description").unwrap(),
            ["This field may not be blank."]
        );
        assert!(fields.get("priority").unwrap()[0].contains("\"urgent\" is not a valid choice"));
        assert!(fields.get("category").is_none());
    }

    #[test]
    fn test_create_rejects_long_title() {
        let err = CreateTicketRequest {
            title: Some("x".repeat(TITLE_MAX_CHARS + 1)),
            description: Some("d".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(validation_fields(err).get("title").is_some());
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let req: UpdateTicketRequest =
            serde_json::from_str(r#"{"category": null, "status": "closed"}"#).unwrap();
        let changes = req.validate(false).unwrap();

        assert_eq!(changes.category, Some(None));
        assert_eq!(changes.priority, None);
        assert_eq!(changes.status, Some(Status::Closed));

        let mut t = ticket("Refund", "charged twice");
        changes.apply(&mut t);
        assert_eq!(t.category, None);
        assert_eq!(t.priority, Some(Priority::High));
        assert_eq!(t.status, Status::Closed);
    }

    #[test]
    fn test_put_requires_title_and_description() {
        let req: UpdateTicketRequest = serde_json::from_str(r#"{"status": "open"}"#).unwrap();
        let fields = validation_fields(req.validate(true).unwrap_err());
        assert!(fields.get("title").is_some());
        assert!(fields.get("description").is_some());

        let req: UpdateTicketRequest = serde_json::from_str(r#"{"status": "open"}"#).unwrap();
        assert!(req.validate(false).is_ok());
    }

    #[test]
    fn test_empty_update_is_empty() {
        let changes = UpdateTicketRequest::default().validate(false).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_filter_ignores_blank_values_and_rejects_unknown() {
        let filter = TicketFilter::from_query(ListQuery {
            category: Some(String::new()),
            status: Some("open".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.category, None);
        assert_eq!(filter.status, Some(Status::Open));

        let err = TicketFilter::from_query(ListQuery {
            priority: Some("asap".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(validation_fields(err).get("priority").is_some());
    }

    #[test]
    fn test_filter_search_terms_match_title_or_description() {
        let t = ticket("Login page broken", "Cannot reset my PASSWORD");
        let search = |s: &str| {
            TicketFilter::from_query(ListQuery {
                search: Some(s.to_string()),
                ..Default::default()
            })
            .unwrap()
        };

        assert!(search("login").matches(&t));
        assert!(search("password").matches(&t));
        assert!(search("LOGIN password").matches(&t));
        assert!(!search("login invoice").matches(&t));
    }

    #[test]
    fn test_filter_exact_matches() {
        let t = ticket("Refund", "charged twice");
        let by_category = |c| TicketFilter {
            category: Some(c),
            ..Default::default()
        };
        assert!(by_category(Category::Billing).matches(&t));
        assert!(!by_category(Category::Technical).matches(&t));
        assert!(!TicketFilter {
            status: Some(Status::Closed),
            ..Default::default()
        }
        .matches(&t));
    }
}
