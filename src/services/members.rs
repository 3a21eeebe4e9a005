//! Members service

use validator::Validate;

use crate::{
    error::AppResult,
    models::member::{CreateMember, Member, MemberActivity},
    repository::Repository,
};

/// Size of the most-active members ranking
const TOP_ACTIVE_LIMIT: i64 = 5;

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn create_member(&self, member: &CreateMember) -> AppResult<Member> {
        member.validate()?;
        let created = self.repository.members.create(member).await?;
        tracing::info!(member_id = created.id, "Member created");
        Ok(created)
    }

    pub async fn get_member(&self, id: i32) -> AppResult<Member> {
        self.repository.members.get_by_id(id).await
    }

    pub async fn list_members(&self) -> AppResult<Vec<Member>> {
        self.repository.members.list().await
    }

    /// Members with the most active loans
    pub async fn top_active(&self) -> AppResult<Vec<MemberActivity>> {
        self.repository.members.top_active(TOP_ACTIVE_LIMIT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, repository::members::MockMembersRepository};
    use mockall::predicate::eq;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_invalid_email_is_rejected() {
        let service = MembersService::new(Repository::in_memory());
        let result = service
            .create_member(&CreateMember {
                username: "alice".to_string(),
                email: "not-an-email".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let service = MembersService::new(Repository::in_memory());
        let member = CreateMember {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        };
        service.create_member(&member).await.unwrap();
        assert!(matches!(
            service.create_member(&member).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_top_active_asks_for_five_members() {
        let mut members = MockMembersRepository::new();
        members
            .expect_top_active()
            .with(eq(TOP_ACTIVE_LIMIT))
            .times(1)
            .returning(|_| {
                Ok(vec![MemberActivity {
                    id: 1,
                    username: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                    active_loans: 3,
                }])
            });
        let repository = Repository {
            members: Arc::new(members),
            ..Repository::in_memory()
        };

        let top = MembersService::new(repository).top_active().await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].active_loans, 3);
    }
}
