//! Review business logic - one rating per user per lesson.
//!
//! A review requires a confirmed or completed enrollment for the lesson.
//! Aggregates are recomputed in full on every write: the lesson's mean
//! rating and count, then the owning teacher's mean and count across all of
//! that teacher's lessons. The recompute runs in the same transaction as the
//! insert so the aggregates can never drift from the review rows.

use crate::{
    entities::{
        Category, Enrollment, EnrollmentStatus, Lesson, Review, Teacher, category, enrollment,
        lesson, review,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;

/// A review joined with its lesson for the "my reviews" listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserReviewView {
    /// Review id
    pub id: i64,
    /// Reviewed lesson
    pub lesson_id: i64,
    /// Joined lesson title
    pub title: Option<String>,
    /// Joined lesson image
    pub image: Option<String>,
    /// Joined category name
    pub category_name: Option<String>,
    /// Star rating, 1 to 5
    pub rating: i32,
    /// Review comment
    pub comment: Option<String>,
    /// When the review was created
    pub created_at: DateTimeUtc,
}

/// Recomputes a lesson's mean rating and review count from its review rows.
async fn recompute_lesson_rating<C>(db: &C, lesson_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let reviews = Review::find()
        .filter(review::Column::LessonId.eq(lesson_id))
        .all(db)
        .await?;

    let count = i32::try_from(reviews.len()).unwrap_or(i32::MAX);
    let mean = if reviews.is_empty() {
        0.0
    } else {
        f64::from(reviews.iter().map(|r| r.rating).sum::<i32>()) / f64::from(count)
    };

    let mut lesson: lesson::ActiveModel = Lesson::find_by_id(lesson_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Lesson".to_string(),
        })?
        .into();
    lesson.rating = Set(mean);
    lesson.review_count = Set(count);
    lesson.updated_at = Set(chrono::Utc::now());
    lesson.update(db).await?;

    Ok(())
}

/// Recomputes a teacher's mean rating and review total across all of the
/// teacher's lessons.
async fn recompute_teacher_rating<C>(db: &C, teacher_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let lesson_ids: Vec<i64> = Lesson::find()
        .filter(lesson::Column::TeacherId.eq(teacher_id))
        .all(db)
        .await?
        .into_iter()
        .map(|l| l.id)
        .collect();

    let reviews = Review::find()
        .filter(review::Column::LessonId.is_in(lesson_ids))
        .all(db)
        .await?;

    let count = i32::try_from(reviews.len()).unwrap_or(i32::MAX);
    let mean = if reviews.is_empty() {
        0.0
    } else {
        f64::from(reviews.iter().map(|r| r.rating).sum::<i32>()) / f64::from(count)
    };

    let mut teacher: crate::entities::teacher::ActiveModel = Teacher::find_by_id(teacher_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Teacher".to_string(),
        })?
        .into();
    teacher.rating = Set(mean);
    teacher.total_reviews = Set(count);
    teacher.updated_at = Set(chrono::Utc::now());
    teacher.update(db).await?;

    Ok(())
}

/// Creates a review and refreshes the derived rating aggregates.
///
/// Fails with `Forbidden` unless the user holds a confirmed or completed
/// enrollment for the lesson, and with `Conflict` when the user already
/// reviewed it.
pub async fn add_review(
    db: &DatabaseConnection,
    user_id: i64,
    lesson_id: i64,
    rating: i32,
    comment: Option<String>,
) -> Result<review::Model> {
    if !(1..=5).contains(&rating) {
        return Err(Error::Validation {
            message: "Rating must be between 1 and 5".to_string(),
        });
    }
    if comment.as_deref().is_some_and(|c| c.len() > 500) {
        return Err(Error::Validation {
            message: "Comment must be less than 500 characters".to_string(),
        });
    }

    let txn = db.begin().await?;

    let lesson = Lesson::find_by_id(lesson_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Lesson".to_string(),
        })?;

    let eligible = Enrollment::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .filter(enrollment::Column::LessonId.eq(lesson_id))
        .filter(
            enrollment::Column::Status
                .is_in([EnrollmentStatus::Confirmed, EnrollmentStatus::Completed]),
        )
        .one(&txn)
        .await?;
    if eligible.is_none() {
        return Err(Error::Forbidden {
            message: "You must be enrolled in this lesson to review it".to_string(),
        });
    }

    let existing = Review::find()
        .filter(review::Column::UserId.eq(user_id))
        .filter(review::Column::LessonId.eq(lesson_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(Error::Conflict {
            message: "You have already reviewed this lesson".to_string(),
        });
    }

    let now = chrono::Utc::now();
    let created = review::ActiveModel {
        user_id: Set(user_id),
        lesson_id: Set(lesson_id),
        rating: Set(rating),
        comment: Set(comment.map(|c| c.trim().to_string())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    recompute_lesson_rating(&txn, lesson_id).await?;
    recompute_teacher_rating(&txn, lesson.teacher_id).await?;

    txn.commit().await?;
    Ok(created)
}

/// Lists the user's reviews, newest first, with lesson context.
pub async fn list_reviews_for_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<UserReviewView>> {
    let reviews = Review::find()
        .filter(review::Column::UserId.eq(user_id))
        .order_by_desc(review::Column::CreatedAt)
        .all(db)
        .await?;

    let lesson_ids: Vec<i64> = reviews.iter().map(|r| r.lesson_id).collect();
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

    Ok(reviews
        .into_iter()
        .map(|r| {
            let lesson = lessons.get(&r.lesson_id);
            let category = lesson.and_then(|l| categories.get(&l.category_id));
            UserReviewView {
                id: r.id,
                lesson_id: r.lesson_id,
                title: lesson.map(|l| l.title.clone()),
                image: lesson.and_then(|l| l.image.clone()),
                category_name: category.map(|c| c.name.clone()),
                rating: r.rating,
                comment: r.comment,
                created_at: r.created_at,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::checkout::cancel;
    use crate::core::lesson::get_lesson_by_id;
    use crate::test_utils::{
        create_test_category, create_test_lesson, create_test_teacher, create_test_user,
        enroll_test_user, setup_test_db, setup_with_lesson,
    };
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_add_review_validation() -> Result<()> {
        // Validation fires before any query, so a mock connection suffices
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = add_review(&db, 1, 1, 0, None).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let result = add_review(&db, 1, 1, 6, None).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let result = add_review(&db, 1, 1, 5, Some("x".repeat(501))).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_add_review_requires_enrollment() -> Result<()> {
        let (db, user, lesson) = setup_with_lesson().await?;

        let result = add_review(&db, user.id, lesson.id, 5, None).await;
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));
        assert_eq!(
            err.to_string(),
            "You must be enrolled in this lesson to review it"
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_add_review_cancelled_enrollment_not_eligible() -> Result<()> {
        let (db, user, lesson) = setup_with_lesson().await?;

        let receipt = enroll_test_user(&db, user.id, lesson.id, 1).await?;
        cancel(&db, user.id, receipt.enrollments[0].id, None).await?;

        let result = add_review(&db, user.id, lesson.id, 5, None).await;
        assert!(matches!(result.unwrap_err(), Error::Forbidden { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_add_review_updates_lesson_and_teacher_aggregates() -> Result<()> {
        let db = setup_test_db().await?;
        let category = create_test_category(&db, "Music").await?;
        let teacher = create_test_teacher(&db, "Dana Reyes").await?;
        let lesson = create_test_lesson(&db, "Guitar Basics", category.id, teacher.id).await?;
        let avery = create_test_user(&db, "Avery Parent").await?;
        let sam = create_test_user(&db, "Sam Parent").await?;

        enroll_test_user(&db, avery.id, lesson.id, 1).await?;
        enroll_test_user(&db, sam.id, lesson.id, 1).await?;

        add_review(&db, avery.id, lesson.id, 5, Some("Great class".to_string())).await?;

        let after_first = get_lesson_by_id(&db, lesson.id).await?.unwrap();
        assert_eq!(after_first.rating, 5.0);
        assert_eq!(after_first.review_count, 1);

        add_review(&db, sam.id, lesson.id, 4, None).await?;

        let after_second = get_lesson_by_id(&db, lesson.id).await?.unwrap();
        assert_eq!(after_second.rating, 4.5);
        assert_eq!(after_second.review_count, 2);

        let teacher_row = Teacher::find_by_id(teacher.id).one(&db).await?.unwrap();
        assert_eq!(teacher_row.rating, 4.5);
        assert_eq!(teacher_row.total_reviews, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_add_review_once_per_lesson() -> Result<()> {
        let (db, user, lesson) = setup_with_lesson().await?;

        enroll_test_user(&db, user.id, lesson.id, 1).await?;
        add_review(&db, user.id, lesson.id, 4, None).await?;

        let result = add_review(&db, user.id, lesson.id, 5, None).await;
        assert!(matches!(result.unwrap_err(), Error::Conflict { .. }));

        // The rejected duplicate must not have skewed the aggregates
        let current = get_lesson_by_id(&db, lesson.id).await?.unwrap();
        assert_eq!(current.rating, 4.0);
        assert_eq!(current.review_count, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_reviews_for_user() -> Result<()> {
        let db = setup_test_db().await?;
        let category = create_test_category(&db, "Music").await?;
        let teacher = create_test_teacher(&db, "Dana Reyes").await?;
        let guitar = create_test_lesson(&db, "Guitar Basics", category.id, teacher.id).await?;
        let violin = create_test_lesson(&db, "Violin Basics", category.id, teacher.id).await?;
        let user = create_test_user(&db, "Avery Parent").await?;

        enroll_test_user(&db, user.id, guitar.id, 1).await?;
        enroll_test_user(&db, user.id, violin.id, 1).await?;

        add_review(&db, user.id, guitar.id, 5, Some("Lovely".to_string())).await?;
        add_review(&db, user.id, violin.id, 3, None).await?;

        let reviews = list_reviews_for_user(&db, user.id).await?;
        assert_eq!(reviews.len(), 2);
        // Newest first
        assert_eq!(reviews[0].lesson_id, violin.id);
        assert_eq!(reviews[0].title.as_deref(), Some("Violin Basics"));
        assert_eq!(reviews[0].category_name.as_deref(), Some("Music"));
        assert_eq!(reviews[1].comment.as_deref(), Some("Lovely"));

        Ok(())
    }
}
