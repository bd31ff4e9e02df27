//! Account business logic - profile, dashboard, and admin user listing.

use crate::{
    auth::Identity,
    core::cart::round_to_cents,
    core::pagination::{Page, Pagination},
    entities::{
        Category, Enrollment, EnrollmentStatus, Lesson, PaymentStatus, Review, Role, Teacher,
        User, category, enrollment, lesson, review, teacher, user,
    },
    errors::{Error, Result},
};
use sea_orm::{Condition, PaginatorTrait, QueryOrder, QuerySelect, prelude::*};
use std::collections::HashMap;

/// A user record with the password hash stripped.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserView {
    /// User id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// Account role
    pub role: Role,
    /// Contact phone number
    pub phone: Option<String>,
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// State or region
    pub state: Option<String>,
    /// Postal code
    pub zip: Option<String>,
    /// When the account was created
    pub created_at: DateTimeUtc,
    /// When the account was last modified
    pub updated_at: DateTimeUtc,
}

impl From<user::Model> for UserView {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            phone: u.phone,
            address: u.address,
            city: u.city,
            state: u.state,
            zip: u.zip,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Headline numbers for the user dashboard.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DashboardStats {
    /// All enrollments regardless of status
    pub total_enrollments: u64,
    /// Enrollments currently confirmed
    pub active_enrollments: u64,
    /// Reviews the user has written
    pub total_reviews: u64,
    /// Sum of `total_amount` over paid enrollments, rounded to cents
    pub total_spent: f64,
}

/// One row of the dashboard's recent-enrollments strip.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RecentEnrollment {
    /// Enrollment id
    pub id: i64,
    /// Joined lesson title
    pub title: Option<String>,
    /// Joined lesson image
    pub image: Option<String>,
    /// Joined category name
    pub category_name: Option<String>,
    /// Lifecycle status
    pub status: EnrollmentStatus,
    /// When the enrollment was created
    pub enrolled_at: DateTimeUtc,
}

/// One row of the dashboard's upcoming-lessons strip.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UpcomingLesson {
    /// Lesson id
    pub lesson_id: i64,
    /// Joined lesson title
    pub title: Option<String>,
    /// Joined lesson schedule
    pub schedule: Option<String>,
    /// Joined category name
    pub category_name: Option<String>,
    /// Joined teacher name
    pub teacher_name: Option<String>,
}

/// Everything the dashboard page renders.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Dashboard {
    /// Headline numbers
    pub stats: DashboardStats,
    /// Up to 5 most recent enrollments
    pub recent_enrollments: Vec<RecentEnrollment>,
    /// Up to 5 confirmed lessons coming up
    pub upcoming_lessons: Vec<UpcomingLesson>,
}

/// Fetches the caller's profile with the password hash stripped.
pub async fn get_profile(db: &DatabaseConnection, user_id: i64) -> Result<UserView> {
    User::find_by_id(user_id)
        .one(db)
        .await?
        .map(UserView::from)
        .ok_or_else(|| Error::NotFound {
            what: "User".to_string(),
        })
}

/// Assembles the caller's dashboard: stats plus recent and upcoming strips.
pub async fn dashboard(db: &DatabaseConnection, user_id: i64) -> Result<Dashboard> {
    let total_enrollments = Enrollment::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    let active_enrollments = Enrollment::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .filter(enrollment::Column::Status.eq(EnrollmentStatus::Confirmed))
        .count(db)
        .await?;
    let total_reviews = Review::find()
        .filter(review::Column::UserId.eq(user_id))
        .count(db)
        .await?;

    let paid = Enrollment::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .filter(enrollment::Column::PaymentStatus.eq(PaymentStatus::Paid))
        .all(db)
        .await?;
    let total_spent = round_to_cents(paid.iter().map(|e| e.total_amount).sum());

    let recent = Enrollment::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .order_by_desc(enrollment::Column::EnrolledAt)
        .limit(5)
        .all(db)
        .await?;

    let upcoming = Enrollment::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .filter(enrollment::Column::Status.eq(EnrollmentStatus::Confirmed))
        .order_by_asc(enrollment::Column::EnrolledAt)
        .limit(5)
        .all(db)
        .await?;

    let lesson_ids: Vec<i64> = recent
        .iter()
        .chain(upcoming.iter())
        .map(|e| e.lesson_id)
        .collect();
    let lessons: HashMap<i64, lesson::Model> = Lesson::find()
        .filter(lesson::Column::Id.is_in(lesson_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    let category_ids: Vec<i64> = lessons.values().map(|l| l.category_id).collect();
    let categories: HashMap<i64, category::Model> = Category::find()
        .filter(category::Column::Id.is_in(category_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let teacher_ids: Vec<i64> = lessons.values().map(|l| l.teacher_id).collect();
    let teachers: HashMap<i64, teacher::Model> = Teacher::find()
        .filter(teacher::Column::Id.is_in(teacher_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();

    let recent_enrollments = recent
        .into_iter()
        .map(|e| {
            let lesson = lessons.get(&e.lesson_id);
            let category = lesson.and_then(|l| categories.get(&l.category_id));
            RecentEnrollment {
                id: e.id,
                title: lesson.map(|l| l.title.clone()),
                image: lesson.and_then(|l| l.image.clone()),
                category_name: category.map(|c| c.name.clone()),
                status: e.status,
                enrolled_at: e.enrolled_at,
            }
        })
        .collect();

    let upcoming_lessons = upcoming
        .into_iter()
        .map(|e| {
            let lesson = lessons.get(&e.lesson_id);
            let category = lesson.and_then(|l| categories.get(&l.category_id));
            let teacher = lesson.and_then(|l| teachers.get(&l.teacher_id));
            UpcomingLesson {
                lesson_id: e.lesson_id,
                title: lesson.map(|l| l.title.clone()),
                schedule: lesson.map(|l| l.schedule.clone()),
                category_name: category.map(|c| c.name.clone()),
                teacher_name: teacher.map(|t| t.name.clone()),
            }
        })
        .collect();

    Ok(Dashboard {
        stats: DashboardStats {
            total_enrollments,
            active_enrollments,
            total_reviews,
            total_spent,
        },
        recent_enrollments,
        upcoming_lessons,
    })
}

/// Lists accounts for the admin console, newest first.
pub async fn list_users(
    db: &DatabaseConnection,
    identity: &Identity,
    role: Option<Role>,
    search: Option<&str>,
    page: u64,
    page_size: u64,
) -> Result<Page<UserView>> {
    identity.require_admin()?;

    let mut query = User::find();
    if let Some(role) = role {
        query = query.filter(user::Column::Role.eq(role));
    }
    if let Some(search) = search {
        query = query.filter(
            Condition::any()
                .add(user::Column::Name.contains(search))
                .add(user::Column::Email.contains(search)),
        );
    }

    let total = query.clone().count(db).await?;
    let pagination = Pagination::new(page, page_size, total);

    let users = query
        .order_by_desc(user::Column::CreatedAt)
        .offset(pagination.offset())
        .limit(pagination.items_per_page)
        .all(db)
        .await?;

    Ok(Page {
        items: users.into_iter().map(UserView::from).collect(),
        pagination,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::checkout::cancel;
    use crate::core::review::add_review;
    use crate::test_utils::{
        admin_identity, create_test_user, create_test_user_with_role, enroll_test_user,
        parent_identity, setup_test_db, setup_with_lesson,
    };

    #[tokio::test]
    async fn test_get_profile_strips_nothing_but_exists() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "Avery Parent").await?;

        let profile = get_profile(&db, user.id).await?;
        assert_eq!(profile.name, "Avery Parent");
        assert_eq!(profile.role, Role::Parent);

        let result = get_profile(&db, 999).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_dashboard_counts() -> Result<()> {
        let (db, user, lesson) = setup_with_lesson().await?;

        let receipt = enroll_test_user(&db, user.id, lesson.id, 2).await?;
        add_review(&db, user.id, lesson.id, 5, None).await?;

        let board = dashboard(&db, user.id).await?;
        assert_eq!(board.stats.total_enrollments, 1);
        assert_eq!(board.stats.active_enrollments, 1);
        assert_eq!(board.stats.total_reviews, 1);
        assert_eq!(board.stats.total_spent, 90.0);
        assert_eq!(board.recent_enrollments.len(), 1);
        assert_eq!(board.upcoming_lessons.len(), 1);
        assert_eq!(
            board.upcoming_lessons[0].title.as_deref(),
            Some("Guitar Basics")
        );

        // Cancellation empties the upcoming strip but not the history
        cancel(&db, user.id, receipt.enrollments[0].id, None).await?;
        let board = dashboard(&db, user.id).await?;
        assert_eq!(board.stats.total_enrollments, 1);
        assert_eq!(board.stats.active_enrollments, 0);
        assert!(board.upcoming_lessons.is_empty());
        assert_eq!(board.recent_enrollments.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_users_requires_admin() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_user(&db, "Avery Parent").await?;

        let result = list_users(&db, &parent_identity(), None, None, 1, 20).await;
        assert!(matches!(result.unwrap_err(), Error::Forbidden { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_list_users_filters() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_user(&db, "Avery Parent").await?;
        create_test_user(&db, "Sam Parent").await?;
        create_test_user_with_role(&db, "Dana Admin", Role::Admin).await?;

        let everyone = list_users(&db, &admin_identity(), None, None, 1, 20).await?;
        assert_eq!(everyone.pagination.total_items, 3);

        let admins = list_users(&db, &admin_identity(), Some(Role::Admin), None, 1, 20).await?;
        assert_eq!(admins.pagination.total_items, 1);
        assert_eq!(admins.items[0].name, "Dana Admin");

        let by_name = list_users(&db, &admin_identity(), None, Some("avery"), 1, 20).await?;
        assert_eq!(by_name.pagination.total_items, 1);
        assert_eq!(by_name.items[0].name, "Avery Parent");

        Ok(())
    }
}
