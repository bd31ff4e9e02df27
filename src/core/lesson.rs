//! Lesson persistence operations and the atomic seat-counter primitives.
//!
//! Provides CRUD over lessons plus the two capacity-sensitive primitives the
//! checkout engine relies on: a conditional atomic increment that refuses to
//! push `students_enrolled` past `max_students`, and a decrement floored at
//! zero. Both run a single SQL UPDATE so concurrent checkouts cannot both
//! pass a read-then-write capacity check.

use crate::{
    auth::Identity,
    entities::{Category, Enrollment, Lesson, PriceUnit, Teacher, enrollment, lesson},
    errors::{Error, Result},
};
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{PaginatorTrait, Set, prelude::*};

/// Attributes for a new lesson listing.
#[derive(Debug, Clone)]
pub struct NewLesson {
    /// Lesson title, at least 3 characters
    pub title: String,
    /// Category the lesson is listed under
    pub category_id: i64,
    /// Teacher offering the lesson
    pub teacher_id: i64,
    /// Price per unit in dollars
    pub price: f64,
    /// Unit the price is quoted in
    pub price_unit: PriceUnit,
    /// Human-readable duration
    pub duration: String,
    /// Human-readable schedule
    pub schedule: String,
    /// Target age range
    pub age_group: String,
    /// Full description, at least 10 characters
    pub description: String,
    /// Cover image URL
    pub image: Option<String>,
    /// Ordered list of selling points
    pub features: Vec<String>,
    /// Seat capacity
    pub max_students: i32,
    /// Whether to promote the lesson on the landing page
    pub featured: bool,
}

/// Typed partial update for a lesson; unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct LessonUpdate {
    /// New title
    pub title: Option<String>,
    /// New category
    pub category_id: Option<i64>,
    /// New teacher
    pub teacher_id: Option<i64>,
    /// New price
    pub price: Option<f64>,
    /// New price unit
    pub price_unit: Option<PriceUnit>,
    /// New duration
    pub duration: Option<String>,
    /// New schedule
    pub schedule: Option<String>,
    /// New age range
    pub age_group: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New cover image URL
    pub image: Option<String>,
    /// New feature list
    pub features: Option<Vec<String>>,
    /// New seat capacity
    pub max_students: Option<i32>,
    /// New featured flag
    pub featured: Option<bool>,
    /// New availability flag
    pub available: Option<bool>,
}

impl LessonUpdate {
    /// True when no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category_id.is_none()
            && self.teacher_id.is_none()
            && self.price.is_none()
            && self.price_unit.is_none()
            && self.duration.is_none()
            && self.schedule.is_none()
            && self.age_group.is_none()
            && self.description.is_none()
            && self.image.is_none()
            && self.features.is_none()
            && self.max_students.is_none()
            && self.featured.is_none()
            && self.available.is_none()
    }
}

/// Finds a lesson by its unique ID.
pub async fn get_lesson_by_id(
    db: &DatabaseConnection,
    lesson_id: i64,
) -> Result<Option<lesson::Model>> {
    Lesson::find_by_id(lesson_id)
        .one(db)
        .await
        .map_err(Into::into)
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().len() < 3 {
        return Err(Error::Validation {
            message: "Title must be at least 3 characters".to_string(),
        });
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<()> {
    if description.trim().len() < 10 {
        return Err(Error::Validation {
            message: "Description must be at least 10 characters".to_string(),
        });
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<()> {
    if price < 0.0 || !price.is_finite() {
        return Err(Error::InvalidAmount { amount: price });
    }
    Ok(())
}

async fn validate_category_exists(db: &DatabaseConnection, category_id: i64) -> Result<()> {
    Category::find_by_id(category_id)
        .one(db)
        .await?
        .map(|_| ())
        .ok_or_else(|| Error::Validation {
            message: "Category not found".to_string(),
        })
}

async fn validate_teacher_exists(db: &DatabaseConnection, teacher_id: i64) -> Result<()> {
    Teacher::find_by_id(teacher_id)
        .one(db)
        .await?
        .map(|_| ())
        .ok_or_else(|| Error::Validation {
            message: "Teacher not found".to_string(),
        })
}

/// Creates a new lesson listing, validating input and referenced ids.
///
/// Teachers and admins may create lessons. The referenced category and
/// teacher must exist; the lesson starts with zero enrollments and reviews
/// and is immediately available.
pub async fn create_lesson(
    db: &DatabaseConnection,
    identity: &Identity,
    new_lesson: NewLesson,
) -> Result<lesson::Model> {
    identity.require_teacher()?;

    validate_title(&new_lesson.title)?;
    validate_description(&new_lesson.description)?;
    validate_price(new_lesson.price)?;
    if new_lesson.max_students < 1 {
        return Err(Error::Validation {
            message: "Max students must be at least 1".to_string(),
        });
    }

    validate_category_exists(db, new_lesson.category_id).await?;
    validate_teacher_exists(db, new_lesson.teacher_id).await?;

    let now = chrono::Utc::now();
    let lesson = lesson::ActiveModel {
        title: Set(new_lesson.title.trim().to_string()),
        category_id: Set(new_lesson.category_id),
        teacher_id: Set(new_lesson.teacher_id),
        price: Set(new_lesson.price),
        price_unit: Set(new_lesson.price_unit),
        rating: Set(0.0),
        review_count: Set(0),
        duration: Set(new_lesson.duration),
        schedule: Set(new_lesson.schedule),
        age_group: Set(new_lesson.age_group),
        students_enrolled: Set(0),
        max_students: Set(new_lesson.max_students),
        description: Set(new_lesson.description.trim().to_string()),
        image: Set(new_lesson.image),
        features: Set(lesson::Features(new_lesson.features)),
        featured: Set(new_lesson.featured),
        available: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    lesson.insert(db).await.map_err(Into::into)
}

/// Applies a typed partial update to an existing lesson.
///
/// Set fields are validated the same way as on creation; an update with no
/// fields set is rejected before touching the store.
pub async fn update_lesson(
    db: &DatabaseConnection,
    identity: &Identity,
    lesson_id: i64,
    update: LessonUpdate,
) -> Result<lesson::Model> {
    identity.require_teacher()?;

    if update.is_empty() {
        return Err(Error::Validation {
            message: "No fields to update".to_string(),
        });
    }

    if let Some(title) = &update.title {
        validate_title(title)?;
    }
    if let Some(description) = &update.description {
        validate_description(description)?;
    }
    if let Some(price) = update.price {
        validate_price(price)?;
    }
    if let Some(max_students) = update.max_students {
        if max_students < 1 {
            return Err(Error::Validation {
                message: "Max students must be at least 1".to_string(),
            });
        }
    }
    if let Some(category_id) = update.category_id {
        validate_category_exists(db, category_id).await?;
    }
    if let Some(teacher_id) = update.teacher_id {
        validate_teacher_exists(db, teacher_id).await?;
    }

    let mut lesson: lesson::ActiveModel = Lesson::find_by_id(lesson_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Lesson".to_string(),
        })?
        .into();

    if let Some(title) = update.title {
        lesson.title = Set(title.trim().to_string());
    }
    if let Some(category_id) = update.category_id {
        lesson.category_id = Set(category_id);
    }
    if let Some(teacher_id) = update.teacher_id {
        lesson.teacher_id = Set(teacher_id);
    }
    if let Some(price) = update.price {
        lesson.price = Set(price);
    }
    if let Some(price_unit) = update.price_unit {
        lesson.price_unit = Set(price_unit);
    }
    if let Some(duration) = update.duration {
        lesson.duration = Set(duration);
    }
    if let Some(schedule) = update.schedule {
        lesson.schedule = Set(schedule);
    }
    if let Some(age_group) = update.age_group {
        lesson.age_group = Set(age_group);
    }
    if let Some(description) = update.description {
        lesson.description = Set(description.trim().to_string());
    }
    if let Some(image) = update.image {
        lesson.image = Set(Some(image));
    }
    if let Some(features) = update.features {
        lesson.features = Set(lesson::Features(features));
    }
    if let Some(max_students) = update.max_students {
        lesson.max_students = Set(max_students);
    }
    if let Some(featured) = update.featured {
        lesson.featured = Set(featured);
    }
    if let Some(available) = update.available {
        lesson.available = Set(available);
    }
    lesson.updated_at = Set(chrono::Utc::now());

    lesson.update(db).await.map_err(Into::into)
}

/// Deletes a lesson listing.
///
/// Admin-only. Refuses while enrollments reference the lesson, so historical
/// enrollment records are never orphaned.
pub async fn delete_lesson(
    db: &DatabaseConnection,
    identity: &Identity,
    lesson_id: i64,
) -> Result<()> {
    identity.require_admin()?;

    let lesson = Lesson::find_by_id(lesson_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Lesson".to_string(),
        })?;

    let enrollment_count = Enrollment::find()
        .filter(enrollment::Column::LessonId.eq(lesson.id))
        .count(db)
        .await?;

    if enrollment_count > 0 {
        return Err(Error::Conflict {
            message: format!(
                "Cannot delete lesson. It has {enrollment_count} enrollment(s) referencing it."
            ),
        });
    }

    lesson.delete(db).await?;
    Ok(())
}

/// Atomically commits `quantity` seats on a lesson, refusing to overfill.
///
/// The capacity check and the increment happen in one conditional UPDATE:
/// `students_enrolled = students_enrolled + quantity` only where the new
/// total stays within `max_students`. A zero row count means the lesson is
/// (now) too full, which surfaces as `CapacityExceeded` carrying the number
/// of seats still open. Runs on any connection so checkout can call it
/// inside its transaction.
pub async fn increment_students_enrolled<C>(
    db: &C,
    lesson_id: i64,
    quantity: i32,
) -> Result<lesson::Model>
where
    C: ConnectionTrait,
{
    let lesson = Lesson::find_by_id(lesson_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Lesson".to_string(),
        })?;

    let result = Lesson::update_many()
        .col_expr(
            lesson::Column::StudentsEnrolled,
            Expr::col(lesson::Column::StudentsEnrolled).add(quantity),
        )
        .filter(lesson::Column::Id.eq(lesson_id))
        .filter(
            Expr::col(lesson::Column::StudentsEnrolled)
                .add(quantity)
                .lte(Expr::col(lesson::Column::MaxStudents)),
        )
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        let available = (lesson.max_students - lesson.students_enrolled).max(0);
        return Err(Error::CapacityExceeded { available });
    }

    Lesson::find_by_id(lesson_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Lesson".to_string(),
        })
}

/// Atomically releases `quantity` seats on a lesson, flooring at zero.
///
/// The common path is a single conditional UPDATE that only fires while the
/// counter stays non-negative; if the counter is already below `quantity`
/// (out-of-order cancellations against manual data edits) it is clamped to
/// zero instead of going negative.
pub async fn decrement_students_enrolled<C>(db: &C, lesson_id: i64, quantity: i32) -> Result<()>
where
    C: ConnectionTrait,
{
    Lesson::find_by_id(lesson_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Lesson".to_string(),
        })?;

    let result = Lesson::update_many()
        .col_expr(
            lesson::Column::StudentsEnrolled,
            Expr::col(lesson::Column::StudentsEnrolled).sub(quantity),
        )
        .filter(lesson::Column::Id.eq(lesson_id))
        .filter(lesson::Column::StudentsEnrolled.gte(quantity))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        Lesson::update_many()
            .col_expr(lesson::Column::StudentsEnrolled, Expr::value(0))
            .filter(lesson::Column::Id.eq(lesson_id))
            .exec(db)
            .await?;
    }

    Ok(())
}
