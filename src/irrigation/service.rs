use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::models::IrrigationEvent;

/// Event columns joined with the creator's account, for a relation aliased `e`.
const EVENT_COLUMNS: &str = "e.id, e.zone_name, e.start_time, e.duration_minutes, \
                             e.water_consumed_liters, e.moisture_level_before, \
                             e.moisture_level_after, e.notes, e.created_by, \
                             u.username AS created_by_username, \
                             u.email AS created_by_email, e.created_at";

const EVENT_FROM: &str = "FROM irrigation_events e JOIN users u ON u.id = e.created_by";

/// Event fields that a caller controls. The actor is never part of this.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFields {
    pub zone_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub water_consumed_liters: Option<f64>,
    pub moisture_level_before: Option<i32>,
    pub moisture_level_after: Option<i32>,
    pub notes: Option<String>,
}

impl From<&IrrigationEvent> for EventFields {
    fn from(e: &IrrigationEvent) -> Self {
        Self {
            zone_name: e.zone_name.clone(),
            start_time: e.start_time,
            duration_minutes: e.duration_minutes,
            water_consumed_liters: e.water_consumed_liters,
            moisture_level_before: e.moisture_level_before,
            moisture_level_after: e.moisture_level_after,
            notes: e.notes.clone(),
        }
    }
}

pub struct IrrigationService {
    pool: PgPool,
}

impl IrrigationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new event credited to `created_by`.
    pub async fn create(
        &self,
        created_by: Uuid,
        fields: EventFields,
    ) -> Result<IrrigationEvent, sqlx::Error> {
        let event = sqlx::query_as::<_, IrrigationEvent>(&format!(
            r#"
            WITH e AS (
                INSERT INTO irrigation_events
                    (zone_name, start_time, duration_minutes, water_consumed_liters,
                     moisture_level_before, moisture_level_after, notes, created_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
            )
            SELECT {EVENT_COLUMNS}
            FROM e JOIN users u ON u.id = e.created_by
            "#
        ))
        .bind(&fields.zone_name)
        .bind(fields.start_time)
        .bind(fields.duration_minutes)
        .bind(fields.water_consumed_liters)
        .bind(fields.moisture_level_before)
        .bind(fields.moisture_level_after)
        .bind(&fields.notes)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        info!(
            event_id = %event.id,
            created_by = %event.created_by,
            duration_minutes = event.duration_minutes,
            "Irrigation event recorded"
        );
        Ok(event)
    }

    /// All events, newest first.
    pub async fn list(&self) -> Result<Vec<IrrigationEvent>, sqlx::Error> {
        sqlx::query_as::<_, IrrigationEvent>(&format!(
            "SELECT {EVENT_COLUMNS} {EVENT_FROM} ORDER BY e.created_at DESC, e.id"
        ))
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<IrrigationEvent>, sqlx::Error> {
        sqlx::query_as::<_, IrrigationEvent>(&format!(
            "SELECT {EVENT_COLUMNS} {EVENT_FROM} WHERE e.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Apply `merge` to the locked row and persist the result. `created_by`
    /// is not writable.
    ///
    /// Returns `Ok(None)` when no such event exists.
    pub async fn update<F>(
        &self,
        id: Uuid,
        merge: F,
    ) -> Result<Option<IrrigationEvent>, sqlx::Error>
    where
        F: FnOnce(EventFields) -> EventFields,
    {
        let mut tx = self.pool.begin().await?;

        let Some(current) = sqlx::query_as::<_, IrrigationEvent>(&format!(
            "SELECT {EVENT_COLUMNS} {EVENT_FROM} WHERE e.id = $1 FOR UPDATE OF e"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let fields = merge(EventFields::from(&current));

        sqlx::query(
            r#"
            UPDATE irrigation_events
            SET zone_name = $2, start_time = $3, duration_minutes = $4,
                water_consumed_liters = $5, moisture_level_before = $6,
                moisture_level_after = $7, notes = $8
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&fields.zone_name)
        .bind(fields.start_time)
        .bind(fields.duration_minutes)
        .bind(fields.water_consumed_liters)
        .bind(fields.moisture_level_before)
        .bind(fields.moisture_level_after)
        .bind(&fields.notes)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query_as::<_, IrrigationEvent>(&format!(
            "SELECT {EVENT_COLUMNS} {EVENT_FROM} WHERE e.id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(event_id = %id, "Irrigation event updated");
        Ok(Some(updated))
    }

    /// Returns `false` when no such event existed.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM irrigation_events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(event_id = %id, "Irrigation event deleted");
        }
        Ok(deleted)
    }
}
