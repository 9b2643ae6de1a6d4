use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Cleaner, NewCleaner},
    traits::ReconciliationError,
};

/// All active, available cleaners offering the given service. Geometric filtering (radius,
/// distance) is the matcher's job, not the query's.
pub async fn eligible_cleaners(service: &str, conn: &mut SqliteConnection) -> Result<Vec<Cleaner>, ReconciliationError> {
    let cleaners = sqlx::query_as(
        r#"
            SELECT c.*
            FROM cleaners c
            JOIN cleaner_specializations s ON s.cleaner_id = c.id
            WHERE s.service = $1 AND c.is_active AND c.is_available;
        "#,
    )
    .bind(service)
    .fetch_all(conn)
    .await?;
    Ok(cleaners)
}

pub async fn fetch_cleaner(cleaner_id: i64, conn: &mut SqliteConnection) -> Result<Option<Cleaner>, sqlx::Error> {
    let cleaner = sqlx::query_as("SELECT * FROM cleaners WHERE id = $1").bind(cleaner_id).fetch_optional(conn).await?;
    Ok(cleaner)
}

/// Registers a cleaner together with their specializations.
pub async fn insert_cleaner(cleaner: NewCleaner, conn: &mut SqliteConnection) -> Result<Cleaner, ReconciliationError> {
    let inserted: Cleaner = sqlx::query_as(
        r#"
            INSERT INTO cleaners (name, email, rating, latitude, longitude, radius_km)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(cleaner.name)
    .bind(cleaner.email)
    .bind(cleaner.rating)
    .bind(cleaner.latitude)
    .bind(cleaner.longitude)
    .bind(cleaner.radius_km)
    .fetch_one(&mut *conn)
    .await?;
    for service in cleaner.specializations {
        sqlx::query("INSERT OR IGNORE INTO cleaner_specializations (cleaner_id, service) VALUES ($1, $2)")
            .bind(inserted.id)
            .bind(service)
            .execute(&mut *conn)
            .await?;
    }
    debug!("🗃️ Cleaner {} registered with id {}", inserted.name, inserted.id);
    Ok(inserted)
}

pub async fn set_availability(
    cleaner_id: i64,
    is_available: bool,
    conn: &mut SqliteConnection,
) -> Result<(), ReconciliationError> {
    sqlx::query("UPDATE cleaners SET is_available = $1 WHERE id = $2")
        .bind(is_available)
        .bind(cleaner_id)
        .execute(conn)
        .await?;
    Ok(())
}
