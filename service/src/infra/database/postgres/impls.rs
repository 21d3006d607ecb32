//! [`Database`] implementations.

#![expect(
    clippy::items_after_statements,
    reason = "`const SQL` after statements"
)]

use async_trait::async_trait;
use common::operations::{By, Insert, Select, Update};
use refinery_core::{
    traits::r#async::{AsyncQuery, AsyncTransaction},
    AsyncMigrate, Migration,
};
use tokio_postgres::{types::ToSql, Row};
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{database, Database},
};

use super::{Error, Postgres};

/// Columns of the `users` table.
const COLUMNS: &str = "\
    id, username, password_hash, real_name, \
    email, phone, role, status, \
    department, avatar_url, last_login_at, created_at";

impl Postgres {
    /// Selects at most one [`User`] matching the `condition`.
    async fn select_user(
        &self,
        condition: &str,
        param: &(dyn ToSql + Sync),
    ) -> Result<Option<User>, Traced<database::Error>> {
        let sql =
            format!("SELECT {COLUMNS} FROM users WHERE {condition} LIMIT 1");
        Ok(self
            .client()
            .await
            .map_err(tracerr::wrap!())?
            .query_opt(sql.as_str(), &[param])
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?
            .as_ref()
            .map(user_from_row))
    }
}

/// Reads a [`User`] out of the provided [`Row`].
fn user_from_row(row: &Row) -> User {
    let role = row.get::<_, Option<String>>("role").and_then(|r| {
        r.parse()
            .inspect_err(|_| tracing::warn!(role = %r, "unknown stored `Role`"))
            .ok()
    });
    User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        real_name: row.get("real_name"),
        email: row.get("email"),
        phone: row.get("phone"),
        role,
        status: row.get("status"),
        department: row.get("department"),
        avatar_url: row.get("avatar_url"),
        last_login_at: row.get("last_login_at"),
        created_at: row.get("created_at"),
    }
}

impl Database<Select<By<Option<User>, user::Id>>> for Postgres {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.select_user("id = $1::INT8", by.by())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<'l> Database<Select<By<Option<User>, &'l user::Username>>> for Postgres {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'l user::Username>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.select_user("username = $1::VARCHAR", by.into_inner())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<'l> Database<Select<By<Option<User>, &'l user::Email>>> for Postgres {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'l user::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.select_user("email = $1::VARCHAR", by.into_inner())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl Database<Insert<User>> for Postgres {
    type Ok = user::Id;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let User {
            id: _,
            username,
            password_hash,
            real_name,
            email,
            phone,
            role,
            status,
            department,
            avatar_url,
            last_login_at,
            created_at,
        } = user;
        let role = role.map(|r| r.to_string());

        const SQL: &str = "\
            INSERT INTO users (\
                username, password_hash, real_name, \
                email, phone, role, status, \
                department, avatar_url, last_login_at, created_at\
            ) \
            VALUES (\
                $1::VARCHAR, $2::VARCHAR, $3::VARCHAR, \
                $4::VARCHAR, $5::VARCHAR, $6::VARCHAR, $7::INT2, \
                $8::VARCHAR, $9::VARCHAR, $10::TIMESTAMPTZ, $11::TIMESTAMPTZ\
            ) \
            RETURNING id";
        self.client()
            .await
            .map_err(tracerr::wrap!())?
            .query_one(
                SQL,
                &[
                    &username,
                    &password_hash,
                    &real_name,
                    &email,
                    &phone,
                    &role,
                    &status,
                    &department,
                    &avatar_url,
                    &last_login_at,
                    &created_at,
                ],
            )
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
            .map(|row| row.get("id"))
    }
}

impl Database<Update<User>> for Postgres {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(user): Update<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let User {
            id,
            username,
            password_hash,
            real_name,
            email,
            phone,
            role,
            status,
            department,
            avatar_url,
            last_login_at,
            created_at: _,
        } = user;
        let role = role.map(|r| r.to_string());

        const SQL: &str = "\
            UPDATE users \
            SET username = $2::VARCHAR, \
                password_hash = $3::VARCHAR, \
                real_name = $4::VARCHAR, \
                email = $5::VARCHAR, \
                phone = $6::VARCHAR, \
                role = $7::VARCHAR, \
                status = $8::INT2, \
                department = $9::VARCHAR, \
                avatar_url = $10::VARCHAR, \
                last_login_at = $11::TIMESTAMPTZ, \
                updated_at = NOW() \
            WHERE id = $1::INT8";
        self.client()
            .await
            .map_err(tracerr::wrap!())?
            .execute(
                SQL,
                &[
                    &id,
                    &username,
                    &password_hash,
                    &real_name,
                    &email,
                    &phone,
                    &role,
                    &status,
                    &department,
                    &avatar_url,
                    &last_login_at,
                ],
            )
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
            .map(drop)
    }
}

#[async_trait]
impl AsyncTransaction for Postgres {
    type Error = Traced<database::Error>;

    async fn execute(
        &mut self,
        queries: &[&str],
    ) -> Result<usize, Self::Error> {
        let mut conn = self.client().await.map_err(tracerr::wrap!())?;
        AsyncTransaction::execute(&mut **conn, queries)
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }
}

#[async_trait]
impl AsyncQuery<Vec<Migration>> for Postgres {
    async fn query(
        &mut self,
        query: &str,
    ) -> Result<Vec<Migration>, <Self as AsyncTransaction>::Error> {
        let mut conn = self.client().await.map_err(tracerr::wrap!())?;
        AsyncQuery::query(&mut **conn, query)
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }
}

impl AsyncMigrate for Postgres {}
