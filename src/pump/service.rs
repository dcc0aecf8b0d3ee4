use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{ControlType, PumpControl, PumpStatus};

/// Command columns joined with the controller's username, for a relation aliased `p`.
const PUMP_COLUMNS: &str = "p.id, p.status, p.control_type, p.recorded_at, p.controlled_by, \
                            u.username AS controlled_by_username, p.device_id, p.notes";

const PUMP_FROM: &str = "FROM pump_controls p LEFT JOIN users u ON u.id = p.controlled_by";

/// Command fields that a caller controls. `controlled_by` is set once, at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFields {
    pub status: PumpStatus,
    pub control_type: ControlType,
    pub device_id: Option<String>,
    pub notes: Option<String>,
}

impl From<&PumpControl> for CommandFields {
    fn from(p: &PumpControl) -> Self {
        Self {
            status: p.status,
            control_type: p.control_type,
            device_id: p.device_id.clone(),
            notes: p.notes.clone(),
        }
    }
}

pub struct PumpControlService {
    pool: PgPool,
}

impl PumpControlService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a command. `controlled_by = None` stores SQL `NULL`.
    pub async fn create(
        &self,
        controlled_by: Option<Uuid>,
        fields: CommandFields,
    ) -> Result<PumpControl, sqlx::Error> {
        let command = sqlx::query_as::<_, PumpControl>(&format!(
            r#"
            WITH p AS (
                INSERT INTO pump_controls (status, control_type, controlled_by, device_id, notes)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT {PUMP_COLUMNS}
            FROM p LEFT JOIN users u ON u.id = p.controlled_by
            "#
        ))
        .bind(fields.status)
        .bind(fields.control_type)
        .bind(controlled_by)
        .bind(&fields.device_id)
        .bind(&fields.notes)
        .fetch_one(&self.pool)
        .await?;

        info!(
            command_id = %command.id,
            status = %command.status,
            control_type = %command.control_type,
            controlled_by = ?command.controlled_by,
            "Pump control command recorded"
        );
        Ok(command)
    }

    /// Commands newest first, optionally for one device only.
    pub async fn list(&self, device_id: Option<&str>) -> Result<Vec<PumpControl>, sqlx::Error> {
        sqlx::query_as::<_, PumpControl>(&format!(
            "SELECT {PUMP_COLUMNS} {PUMP_FROM} \
             WHERE ($1::text IS NULL OR p.device_id = $1) \
             ORDER BY p.recorded_at DESC, p.id"
        ))
        .bind(device_id)
        .fetch_all(&self.pool)
        .await
    }

    /// The command a field device should currently obey.
    pub async fn latest(&self, device_id: Option<&str>) -> Result<Option<PumpControl>, sqlx::Error> {
        sqlx::query_as::<_, PumpControl>(&format!(
            "SELECT {PUMP_COLUMNS} {PUMP_FROM} \
             WHERE ($1::text IS NULL OR p.device_id = $1) \
             ORDER BY p.recorded_at DESC, p.id \
             LIMIT 1"
        ))
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<PumpControl>, sqlx::Error> {
        sqlx::query_as::<_, PumpControl>(&format!(
            "SELECT {PUMP_COLUMNS} {PUMP_FROM} WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Apply `merge` to the locked row and persist the result.
    ///
    /// Returns `Ok(None)` when no such command exists.
    pub async fn update<F>(&self, id: Uuid, merge: F) -> Result<Option<PumpControl>, sqlx::Error>
    where
        F: FnOnce(CommandFields) -> CommandFields,
    {
        let mut tx = self.pool.begin().await?;

        let Some(current) = sqlx::query_as::<_, PumpControl>(&format!(
            "SELECT {PUMP_COLUMNS} {PUMP_FROM} WHERE p.id = $1 FOR UPDATE OF p"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let fields = merge(CommandFields::from(&current));

        sqlx::query(
            "UPDATE pump_controls \
             SET status = $2, control_type = $3, device_id = $4, notes = $5 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(fields.status)
        .bind(fields.control_type)
        .bind(&fields.device_id)
        .bind(&fields.notes)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query_as::<_, PumpControl>(&format!(
            "SELECT {PUMP_COLUMNS} {PUMP_FROM} WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(command_id = %id, status = %updated.status, "Pump control command updated");
        Ok(Some(updated))
    }

    /// Returns `false` when no such command existed.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pump_controls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(command_id = %id, "Pump control command deleted");
        }
        Ok(deleted)
    }
}
