use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::models::DeviceReading;

const READING_COLUMNS: &str = "id, recorded_at, temperature, soil_moisture, device_id";

/// Measured values of a reading. Readings carry no actor.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingFields {
    /// Degrees Celsius
    pub temperature: f64,
    /// Percent, 0-100.
    pub soil_moisture: i32,
    pub device_id: Option<String>,
}

impl From<&DeviceReading> for ReadingFields {
    fn from(r: &DeviceReading) -> Self {
        Self {
            temperature: r.temperature,
            soil_moisture: r.soil_moisture,
            device_id: r.device_id.clone(),
        }
    }
}

pub struct ReadingService {
    pool: PgPool,
}

impl ReadingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a reading. Identical submissions produce distinct rows.
    pub async fn create(&self, fields: ReadingFields) -> Result<DeviceReading, sqlx::Error> {
        let reading = sqlx::query_as::<_, DeviceReading>(&format!(
            "INSERT INTO device_readings (temperature, soil_moisture, device_id) \
             VALUES ($1, $2, $3) \
             RETURNING {READING_COLUMNS}"
        ))
        .bind(fields.temperature)
        .bind(fields.soil_moisture)
        .bind(&fields.device_id)
        .fetch_one(&self.pool)
        .await?;

        info!(
            reading_id = %reading.id,
            device_id = ?reading.device_id,
            temperature = reading.temperature,
            soil_moisture = reading.soil_moisture,
            "Device reading stored"
        );
        Ok(reading)
    }

    /// Readings newest first, optionally for one device only.
    pub async fn list(&self, device_id: Option<&str>) -> Result<Vec<DeviceReading>, sqlx::Error> {
        sqlx::query_as::<_, DeviceReading>(&format!(
            "SELECT {READING_COLUMNS} FROM device_readings \
             WHERE ($1::text IS NULL OR device_id = $1) \
             ORDER BY recorded_at DESC, id"
        ))
        .bind(device_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<DeviceReading>, sqlx::Error> {
        sqlx::query_as::<_, DeviceReading>(&format!(
            "SELECT {READING_COLUMNS} FROM device_readings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Apply `merge` to the locked row and persist the result.
    ///
    /// Returns `Ok(None)` when no such reading exists.
    pub async fn update<F>(&self, id: Uuid, merge: F) -> Result<Option<DeviceReading>, sqlx::Error>
    where
        F: FnOnce(ReadingFields) -> ReadingFields,
    {
        let mut tx = self.pool.begin().await?;

        let Some(current) = sqlx::query_as::<_, DeviceReading>(&format!(
            "SELECT {READING_COLUMNS} FROM device_readings WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let fields = merge(ReadingFields::from(&current));

        let updated = sqlx::query_as::<_, DeviceReading>(&format!(
            "UPDATE device_readings \
             SET temperature = $2, soil_moisture = $3, device_id = $4 \
             WHERE id = $1 \
             RETURNING {READING_COLUMNS}"
        ))
        .bind(id)
        .bind(fields.temperature)
        .bind(fields.soil_moisture)
        .bind(&fields.device_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(reading_id = %id, "Device reading updated");
        Ok(Some(updated))
    }

    /// Returns `false` when no such reading existed.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM device_readings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(reading_id = %id, "Device reading deleted");
        }
        Ok(deleted)
    }
}
