use anyhow::{anyhow, Result};
use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use diesel::PgConnection;

use crate::core::config::DatabaseConfig;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_conn(config: &DatabaseConfig) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(config.url.clone());
    Pool::builder().max_size(config.pool_size).build(manager)
}

/// Run database migrations
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("Migration error: {e}"))?;
    if !applied.is_empty() {
        log::info!("Applied {} database migration(s)", applied.len());
    }
    Ok(())
}

/// Escapes LIKE wildcards so a search term matches literally, then wraps it
/// for a substring match.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_wraps_term() {
        assert_eq!(like_pattern("login"), "%login%");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
