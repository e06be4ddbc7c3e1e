//! `PostgreSQL` address book queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tienda_core::{AddressId, Region, UserId};

use super::{AddressStore, PgStore, RepositoryError};
use crate::models::{Address, AddressFields};

const ADDRESS_COLUMNS: &str = "id, user_id, full_name, phone, street, reference, comuna, \
                               region, postal_code, country, is_default, created_at";

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    full_name: String,
    phone: String,
    street: String,
    reference: Option<String>,
    comuna: String,
    region: Region,
    postal_code: Option<String>,
    country: String,
    is_default: bool,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(r: AddressRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            fields: AddressFields {
                full_name: r.full_name,
                phone: r.phone,
                street: r.street,
                reference: r.reference,
                comuna: r.comuna,
                region: r.region,
                postal_code: r.postal_code,
                country: r.country,
            },
            is_default: r.is_default,
            created_at: r.created_at,
        }
    }
}

/// Insert an address on any executor (pool or open transaction).
pub(super) async fn insert<'e, E>(
    executor: E,
    user: UserId,
    fields: &AddressFields,
    is_default: bool,
) -> Result<Address, RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO storefront.address
             (user_id, full_name, phone, street, reference, comuna, region, postal_code, country,
              is_default)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING {ADDRESS_COLUMNS}"
    );
    let row = sqlx::query_as::<_, AddressRow>(&sql)
        .bind(user)
        .bind(&fields.full_name)
        .bind(&fields.phone)
        .bind(&fields.street)
        .bind(&fields.reference)
        .bind(&fields.comuna)
        .bind(fields.region)
        .bind(&fields.postal_code)
        .bind(&fields.country)
        .bind(is_default)
        .fetch_one(executor)
        .await?;
    Ok(row.into())
}

async fn update<'e, E>(
    executor: E,
    user: UserId,
    id: AddressId,
    fields: &AddressFields,
    is_default: bool,
) -> Result<Address, RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE storefront.address
         SET full_name = $3, phone = $4, street = $5, reference = $6, comuna = $7,
             region = $8, postal_code = $9, country = $10, is_default = $11,
             updated_at = now()
         WHERE id = $1 AND user_id = $2
         RETURNING {ADDRESS_COLUMNS}"
    );
    sqlx::query_as::<_, AddressRow>(&sql)
        .bind(id)
        .bind(user)
        .bind(&fields.full_name)
        .bind(&fields.phone)
        .bind(&fields.street)
        .bind(&fields.reference)
        .bind(&fields.comuna)
        .bind(fields.region)
        .bind(&fields.postal_code)
        .bind(&fields.country)
        .bind(is_default)
        .fetch_optional(executor)
        .await?
        .map(Address::from)
        .ok_or(RepositoryError::NotFound)
}

/// Lock the user's addresses so concurrent default switches serialize.
async fn lock_addresses(
    conn: &mut sqlx::PgConnection,
    user: UserId,
) -> Result<Vec<AddressId>, RepositoryError> {
    Ok(
        sqlx::query_scalar("SELECT id FROM storefront.address WHERE user_id = $1 FOR UPDATE")
            .bind(user)
            .fetch_all(conn)
            .await?,
    )
}

/// Clear the default flag on every address of `user` except `keep`.
async fn clear_other_defaults(
    conn: &mut sqlx::PgConnection,
    user: UserId,
    keep: Option<AddressId>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE storefront.address SET is_default = FALSE, updated_at = now()
         WHERE user_id = $1 AND is_default AND id IS DISTINCT FROM $2",
    )
    .bind(user)
    .bind(keep)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl AddressStore for PgStore {
    async fn addresses(&self, user: UserId) -> Result<Vec<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address
             WHERE user_id = $1
             ORDER BY is_default DESC, created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(user)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn address(
        &self,
        user: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address WHERE id = $1 AND user_id = $2"
        );
        let row = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(id)
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Address::from))
    }

    async fn save_address(
        &self,
        user: UserId,
        id: Option<AddressId>,
        fields: &AddressFields,
        is_default: bool,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Clear first: the partial unique index allows one default per user.
        if is_default {
            lock_addresses(&mut tx, user).await?;
            clear_other_defaults(&mut tx, user, id).await?;
        }

        let saved = match id {
            Some(id) => update(&mut *tx, user, id, fields, is_default).await?,
            None => insert(&mut *tx, user, fields, is_default).await?,
        };

        tx.commit().await?;
        Ok(saved)
    }

    async fn set_default_address(
        &self,
        user: UserId,
        id: AddressId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if !lock_addresses(&mut tx, user).await?.contains(&id) {
            return Err(RepositoryError::NotFound);
        }

        // Clear first: the partial unique index allows one default per user.
        clear_other_defaults(&mut tx, user, Some(id)).await?;

        sqlx::query(
            "UPDATE storefront.address SET is_default = TRUE, updated_at = now()
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_address(&self, user: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.address WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
