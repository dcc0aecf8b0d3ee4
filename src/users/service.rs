use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::password,
    db::models::{User, UserRole},
};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, address, \
                            phone_number, role, is_active, date_joined, password_hash";

/// Account fields accepted on registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    /// argon2id PHC string, see [`password::hash`].
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub role: UserRole,
}

/// Profile fields after merging an update into the stored account.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    /// Replacement argon2id hash; `None` keeps the stored one.
    pub password_hash: Option<String>,
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewUser) -> Result<User, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users \
                 (username, email, first_name, last_name, address, phone_number, role, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.address)
        .bind(&new.phone_number)
        .bind(new.role)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await?;

        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    pub async fn list(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY date_joined ASC, username ASC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Accounts that may act: existing and not deactivated.
    pub async fn find_active(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_active"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Check a username/password pair. Unknown users, inactive users and wrong
    /// passwords are indistinguishable to the caller: each runs one argon2
    /// verification and yields `None`.
    pub async fn authenticate(
        &self,
        username: &str,
        plain_password: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND is_active"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let stored = user.as_ref().map(|u| u.password_hash.clone());
        let matches = password::verify_blocking(plain_password.to_owned(), stored).await?;
        Ok(user.filter(|_| matches))
    }

    /// Apply `merge` to the locked row and persist the result.
    ///
    /// Returns `Ok(None)` when no such account exists.
    pub async fn update<F>(&self, id: Uuid, merge: F) -> Result<Option<User>, sqlx::Error>
    where
        F: FnOnce(&User) -> UserChanges,
    {
        let mut tx = self.pool.begin().await?;

        let Some(current) = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let changes = merge(&current);
        let password_hash = changes.password_hash.unwrap_or(current.password_hash);

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users \
             SET email = $2, first_name = $3, last_name = $4, address = $5, \
                 phone_number = $6, role = $7, is_active = $8, password_hash = $9 \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.address)
        .bind(&changes.phone_number)
        .bind(changes.role)
        .bind(changes.is_active)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(user_id = %user.id, "User updated");
        Ok(Some(user))
    }

    /// Returns `false` when no such account existed.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(user_id = %id, "User deleted");
        }
        Ok(deleted)
    }
}
