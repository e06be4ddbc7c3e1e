//! `PostgreSQL` account and profile queries.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use tienda_core::{Email, ProfileId, UserId};

use super::{PgStore, RepositoryError, UserStore, conflict_on_unique};
use crate::models::{NewUser, Profile, ProfileFields, User};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, created_at";

const PROFILE_COLUMNS: &str = "id, user_id, phone, birth_date, street, city, state, postal_code, \
                               country, newsletter, notifications, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    email: Email,
    first_name: String,
    last_name: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            email: r.email,
            first_name: r.first_name,
            last_name: r.last_name,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LoginRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: ProfileId,
    user_id: UserId,
    phone: String,
    birth_date: Option<NaiveDate>,
    street: String,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    newsletter: bool,
    notifications: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(r: ProfileRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            fields: ProfileFields {
                phone: r.phone,
                birth_date: r.birth_date,
                street: r.street,
                city: r.city,
                state: r.state,
                postal_code: r.postal_code,
                country: r.country,
                newsletter: r.newsletter,
                notifications: r.notifications,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Name the column behind a unique violation on the `user` table.
fn user_conflict(e: sqlx::Error) -> RepositoryError {
    let column = match &e {
        sqlx::Error::Database(db_err) if db_err.constraint() == Some("user_username_key") => {
            "username"
        }
        _ => "email",
    };
    conflict_on_unique(e, column)
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO storefront.user (username, email, first_name, last_name, password_hash)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(user_conflict)?;
        Ok(row.into())
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM storefront.user WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn user_for_login(
        &self,
        login: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, password_hash FROM storefront.user
             WHERE username = $1 OR lower(email) = lower($1)
             ORDER BY (username = $1) DESC
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, LoginRow>(&sql)
            .bind(login.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| (r.user.into(), r.password_hash)))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepositoryError> {
        let exists =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM storefront.user WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn email_owner(&self, email: &Email) -> Result<Option<UserId>, RepositoryError> {
        let owner = sqlx::query_scalar(
            "SELECT id FROM storefront.user WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner)
    }

    async fn update_user(
        &self,
        id: UserId,
        first_name: &str,
        last_name: &str,
        email: &Email,
    ) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE storefront.user
             SET first_name = $2, last_name = $3, email = $4, updated_at = now()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(first_name)
            .bind(last_name)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(user_conflict)?
            .map(User::from)
            .ok_or(RepositoryError::NotFound)
    }

    async fn profile(&self, user: UserId) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM storefront.profile WHERE user_id = $1");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Profile::from))
    }

    async fn create_profile(&self, user: UserId) -> Result<Profile, RepositoryError> {
        let defaults = ProfileFields::default();
        let sql = format!(
            "INSERT INTO storefront.profile (user_id, country, newsletter, notifications)
             VALUES ($1, $2, $3, $4)
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user)
            .bind(&defaults.country)
            .bind(defaults.newsletter)
            .bind(defaults.notifications)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "profile"))?;
        Ok(row.into())
    }

    async fn update_profile(
        &self,
        user: UserId,
        fields: &ProfileFields,
    ) -> Result<Profile, RepositoryError> {
        let sql = format!(
            "UPDATE storefront.profile
             SET phone = $2, birth_date = $3, street = $4, city = $5, state = $6,
                 postal_code = $7, country = $8, newsletter = $9, notifications = $10,
                 updated_at = now()
             WHERE user_id = $1
             RETURNING {PROFILE_COLUMNS}"
        );
        sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user)
            .bind(&fields.phone)
            .bind(fields.birth_date)
            .bind(&fields.street)
            .bind(&fields.city)
            .bind(&fields.state)
            .bind(&fields.postal_code)
            .bind(&fields.country)
            .bind(fields.newsletter)
            .bind(fields.notifications)
            .fetch_optional(&self.pool)
            .await?
            .map(Profile::from)
            .ok_or(RepositoryError::NotFound)
    }
}
