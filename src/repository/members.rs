//! Members repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::member::{CreateMember, Member, MemberActivity},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembersRepository: Send + Sync {
    async fn create(&self, member: &CreateMember) -> AppResult<Member>;

    async fn get_by_id(&self, id: i32) -> AppResult<Member>;

    async fn list(&self) -> AppResult<Vec<Member>>;

    /// Members holding at least one active loan, busiest first
    async fn top_active(&self, limit: i64) -> AppResult<Vec<MemberActivity>>;
}

#[derive(Clone)]
pub struct PgMembersRepository {
    pool: Pool<Postgres>,
}

impl PgMembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembersRepository for PgMembersRepository {
    async fn create(&self, member: &CreateMember) -> AppResult<Member> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE username = $1)")
                .bind(&member.username)
                .fetch_one(&self.pool)
                .await?;

        if exists {
            return Err(AppError::Validation(format!(
                "Username {} is already taken",
                member.username
            )));
        }

        let created = sqlx::query_as::<_, Member>(
            "INSERT INTO members (username, email) VALUES ($1, $2) RETURNING id, username, email",
        )
        .bind(&member.username)
        .bind(&member.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Member> {
        sqlx::query_as::<_, Member>("SELECT id, username, email FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    async fn list(&self) -> AppResult<Vec<Member>> {
        let members =
            sqlx::query_as::<_, Member>("SELECT id, username, email FROM members ORDER BY username")
                .fetch_all(&self.pool)
                .await?;

        Ok(members)
    }

    async fn top_active(&self, limit: i64) -> AppResult<Vec<MemberActivity>> {
        let members = sqlx::query_as::<_, MemberActivity>(
            r#"
            SELECT m.id, m.username, m.email, COUNT(l.id) AS active_loans
            FROM members m
            JOIN loans l ON l.member_id = m.id AND NOT l.is_returned
            GROUP BY m.id, m.username, m.email
            ORDER BY active_loans DESC, m.id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }
}
