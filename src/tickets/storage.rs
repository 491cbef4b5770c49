use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel::PgConnection;
use std::collections::BTreeMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::core::shared::enums::{Category, Priority, Status};
use crate::core::shared::schema::tickets;
use crate::core::shared::utils::{like_pattern, DbPool};
use crate::tickets::error::TicketsError;
use crate::tickets::stats::StatsParts;
use crate::tickets::types::{NewTicket, Ticket, TicketChanges, TicketFilter};

/// Persistence for tickets. Listing is always newest first.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn list(&self, filter: TicketFilter) -> Result<Vec<Ticket>, TicketsError>;

    async fn get(&self, id: Uuid) -> Result<Ticket, TicketsError>;

    async fn create(&self, new: NewTicket) -> Result<Ticket, TicketsError>;

    /// Fails with `NotFound` and changes nothing when `id` is unknown.
    async fn update(&self, id: Uuid, changes: TicketChanges) -> Result<Ticket, TicketsError>;

    async fn stats_parts(&self) -> Result<StatsParts, TicketsError>;

    async fn is_healthy(&self) -> bool;

    fn backend(&self) -> &'static str;
}

fn not_found(id: Uuid) -> TicketsError {
    TicketsError::NotFound(format!("Ticket {id} not found"))
}

// ============================================================================
// POSTGRES
// ============================================================================

#[derive(QueryableByName)]
struct DayCount {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

pub struct PgTicketStore {
    pool: DbPool,
}

impl PgTicketStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Runs blocking diesel work on a pooled connection.
    async fn run<T, F>(&self, work: F) -> Result<T, TicketsError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, TicketsError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            work(&mut conn)
        })
        .await
        .map_err(|e| TicketsError::Internal(format!("Database task failed: {e}")))?
    }
}

fn find_ticket(conn: &mut PgConnection, id: Uuid) -> Result<Ticket, TicketsError> {
    tickets::table
        .find(id)
        .select(Ticket::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| not_found(id))
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn list(&self, filter: TicketFilter) -> Result<Vec<Ticket>, TicketsError> {
        self.run(move |conn| {
            let mut query = tickets::table.select(Ticket::as_select()).into_boxed();

            if let Some(category) = filter.category {
                query = query.filter(tickets::category.eq(category));
            }
            if let Some(priority) = filter.priority {
                query = query.filter(tickets::priority.eq(priority));
            }
            if let Some(status) = filter.status {
                query = query.filter(tickets::status.eq(status));
            }
            for term in &filter.search_terms {
                let pattern = like_pattern(term);
                query = query.filter(
                    tickets::title
                        .ilike(pattern.clone())
                        .or(tickets::description.ilike(pattern)),
                );
            }

            let rows = query.order(tickets::created_at.desc()).load(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Ticket, TicketsError> {
        self.run(move |conn| find_ticket(conn, id)).await
    }

    async fn create(&self, new: NewTicket) -> Result<Ticket, TicketsError> {
        let ticket = Ticket::from_new(new, Utc::now());
        self.run(move |conn| {
            let created = diesel::insert_into(tickets::table)
                .values(&ticket)
                .returning(Ticket::as_returning())
                .get_result(conn)?;
            Ok(created)
        })
        .await
    }

    async fn update(&self, id: Uuid, changes: TicketChanges) -> Result<Ticket, TicketsError> {
        self.run(move |conn| {
            if changes.is_empty() {
                return find_ticket(conn, id);
            }
            diesel::update(tickets::table.find(id))
                .set(&changes)
                .returning(Ticket::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| not_found(id))
        })
        .await
    }

    async fn stats_parts(&self) -> Result<StatsParts, TicketsError> {
        self.run(|conn| {
            let total: i64 = tickets::table.count().get_result(conn)?;
            let open: i64 = tickets::table
                .filter(tickets::status.eq(Status::Open))
                .count()
                .get_result(conn)?;

            let per_day = diesel::sql_query(
                "SELECT COUNT(*) AS count FROM tickets \
                 GROUP BY DATE(created_at AT TIME ZONE 'UTC')",
            )
            .load::<DayCount>(conn)?
            .into_iter()
            .map(|day| day.count)
            .collect();

            let by_priority = tickets::table
                .group_by(tickets::priority)
                .select((tickets::priority, diesel::dsl::count_star()))
                .load::<(Option<Priority>, i64)>(conn)?;

            let by_category = tickets::table
                .group_by(tickets::category)
                .select((tickets::category, diesel::dsl::count_star()))
                .load::<(Option<Category>, i64)>(conn)?;

            Ok(StatsParts {
                total,
                open,
                per_day,
                by_priority,
                by_category,
            })
        })
        .await
    }

    async fn is_healthy(&self) -> bool {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || pool.get().is_ok())
            .await
            .unwrap_or(false)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

// ============================================================================
// MEMORY
// ============================================================================

/// Process-local store for development and tests. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    tickets: RwLock<Vec<Ticket>>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from existing records, keeping their ids and timestamps.
    pub fn from_tickets(tickets: Vec<Ticket>) -> Self {
        Self {
            tickets: RwLock::new(tickets),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<Ticket>>, TicketsError> {
        self.tickets
            .read()
            .map_err(|_| TicketsError::Internal("Ticket store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<Ticket>>, TicketsError> {
        self.tickets
            .write()
            .map_err(|_| TicketsError::Internal("Ticket store lock poisoned".to_string()))
    }
}

fn count_by<K: Ord>(keys: impl Iterator<Item = K>) -> Vec<(K, i64)> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn list(&self, filter: TicketFilter) -> Result<Vec<Ticket>, TicketsError> {
        let mut rows: Vec<Ticket> = self
            .read()?
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Ticket, TicketsError> {
        self.read()?
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn create(&self, new: NewTicket) -> Result<Ticket, TicketsError> {
        let ticket = Ticket::from_new(new, Utc::now());
        self.write()?.push(ticket.clone());
        Ok(ticket)
    }

    async fn update(&self, id: Uuid, changes: TicketChanges) -> Result<Ticket, TicketsError> {
        let mut tickets = self.write()?;
        let ticket = tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found(id))?;
        changes.apply(ticket);
        Ok(ticket.clone())
    }

    async fn stats_parts(&self) -> Result<StatsParts, TicketsError> {
        let tickets = self.read()?;
        let days: Vec<(NaiveDate, i64)> =
            count_by(tickets.iter().map(|t| t.created_at.date_naive()));

        Ok(StatsParts {
            total: tickets.len() as i64,
            open: tickets.iter().filter(|t| t.status == Status::Open).count() as i64,
            per_day: days.into_iter().map(|(_, count)| count).collect(),
            by_priority: count_by(tickets.iter().map(|t| t.priority)),
            by_category: count_by(tickets.iter().map(|t| t.category)),
        })
    }

    async fn is_healthy(&self) -> bool {
        self.tickets.read().is_ok()
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
