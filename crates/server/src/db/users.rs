//! `PostgreSQL` user repository.
//!
//! A user and its addresses are written in a single transaction, so a failed
//! create never leaves orphaned addresses behind.

use sqlx::{FromRow, PgPool};

use sika_core::{Address, User, UserId};

use super::{RepositoryError, UserStore};

#[derive(Debug, FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    phone_number: String,
}

#[derive(Debug, FromRow)]
struct AddressRow {
    street: String,
    city: String,
    state: String,
    zip_code: String,
    country: String,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            street: row.street,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            country: row.country,
        }
    }
}

/// User store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new user store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl UserStore for PgUserStore {
    /// Insert a user and its addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the id already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO sika.user (id, name, email, phone_number)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone_number)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict(format!("user {} already exists", user.id));
            }
            RepositoryError::Database(e)
        })?;

        for address in &user.addresses {
            sqlx::query(
                r"
                INSERT INTO sika.address (user_id, street, city, state, zip_code, country)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(&user.id)
            .bind(&address.street)
            .bind(&address.city)
            .bind(&address.state)
            .bind(&address.zip_code)
            .bind(&address.country)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(user)
    }

    /// Get a user by id, with addresses in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` if a query fails.
    async fn get(&self, id: &UserId) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            SELECT id, name, email, phone_number
            FROM sika.user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(RepositoryError::NotFound);
        };

        let addresses: Vec<AddressRow> = sqlx::query_as(
            r"
            SELECT street, city, state, zip_code, country
            FROM sika.address
            WHERE user_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            phone_number: row.phone_number,
            addresses: addresses.into_iter().map(Address::from).collect(),
        })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
