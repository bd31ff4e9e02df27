//! Checkout and enrollment business logic - the capacity-sensitive core.
//!
//! Checkout converts a user's cart into enrollment records. The whole flow
//! (insert enrollments, commit seats, clear the cart, confirm payment) runs
//! inside one database transaction keyed by a shared payment correlation id:
//! any failure, including a seat-counter refusal, rolls back every row the
//! checkout touched. Seat commits go through the conditional atomic
//! increment in [`crate::core::lesson`], so two concurrent checkouts can
//! never oversell a lesson even though both passed the advisory cart check.
//!
//! Payment is simulated: once the card or method validates, enrollments are
//! created pending and confirmed paid within the same call.

use crate::{
    core::cart::{TAX_RATE, round_to_cents},
    core::lesson::{decrement_students_enrolled, increment_students_enrolled},
    core::pagination::{Page, Pagination},
    entities::{
        CartItem, Category, Enrollment, EnrollmentStatus, Lesson, PaymentMethod, PaymentStatus,
        Teacher, cart_item, category, enrollment, lesson, teacher,
    },
    errors::{Error, Result},
};
use sea_orm::{PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Student details supplied once per checkout and stamped onto every
/// enrollment it creates.
#[derive(Debug, Clone)]
pub struct StudentInfo {
    /// Name of the attending student, at least 2 characters
    pub student_name: String,
    /// Contact phone number
    pub phone_number: Option<String>,
    /// Age of the attending student, 3 to 18
    pub student_age: i32,
    /// School grade
    pub student_grade: Option<String>,
    /// Free-form notes for the teacher
    pub special_notes: Option<String>,
}

/// Payment details for one checkout. Card fields are only consulted when the
/// method is [`PaymentMethod::Card`].
#[derive(Debug, Clone)]
pub struct PaymentInfo {
    /// How the checkout is paid
    pub method: PaymentMethod,
    /// Card number, 13 to 19 digits
    pub card_number: Option<String>,
    /// Card expiry in MM/YY form
    pub card_expiry: Option<String>,
    /// Card verification value, 3 or 4 digits
    pub card_cvv: Option<String>,
    /// Name on the card, at least 2 characters
    pub cardholder_name: Option<String>,
}

/// One line of a checkout receipt.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EnrollmentLine {
    /// Created enrollment id
    pub id: i64,
    /// Lesson enrolled into
    pub lesson_id: i64,
    /// Lesson title at checkout time
    pub title: String,
    /// Seats purchased
    pub quantity: i32,
    /// Price x quantity, rounded to cents
    pub amount: f64,
}

/// Monetary totals for one checkout, rounded to cents.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CheckoutSummary {
    /// Sum of price x quantity across lines
    pub subtotal: f64,
    /// `subtotal x 0.10`
    pub tax: f64,
    /// `subtotal + tax`
    pub total: f64,
    /// The student the enrollments were made for
    pub student_name: String,
    /// Number of enrollment records created
    pub enrollment_count: usize,
}

/// Everything a successful checkout returns.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutReceipt {
    /// Correlation id shared by every enrollment of this checkout
    pub payment_id: String,
    /// Per-lesson breakdown
    pub enrollments: Vec<EnrollmentLine>,
    /// Totals
    pub summary: CheckoutSummary,
}

/// Aggregate enrollment counts and spend for one user.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EnrollmentSummary {
    /// All enrollments regardless of status
    pub total_enrollments: u64,
    /// Enrollments in `confirmed`
    pub confirmed_enrollments: u64,
    /// Enrollments in `pending`
    pub pending_enrollments: u64,
    /// Enrollments in `cancelled`
    pub cancelled_enrollments: u64,
    /// Enrollments in `completed`
    pub completed_enrollments: u64,
    /// Sum of `total_amount` over paid enrollments, rounded to cents
    pub total_spent: f64,
}

/// An enrollment denormalized with its lesson, category, and teacher.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EnrollmentView {
    /// Enrollment id
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Lesson enrolled into
    pub lesson_id: i64,
    /// Name of the attending student
    pub student_name: String,
    /// Age of the attending student
    pub student_age: i32,
    /// School grade
    pub student_grade: Option<String>,
    /// Notes, or the cancellation reason after a cancel
    pub special_notes: Option<String>,
    /// Seats purchased
    pub quantity: i32,
    /// Price x quantity at checkout time
    pub total_amount: f64,
    /// Lifecycle status
    pub status: EnrollmentStatus,
    /// Payment settlement status
    pub payment_status: PaymentStatus,
    /// How the checkout was paid
    pub payment_method: PaymentMethod,
    /// Correlation id of the originating checkout
    pub payment_id: String,
    /// When the enrollment was created
    pub enrolled_at: DateTimeUtc,
    /// Joined lesson title
    pub title: Option<String>,
    /// Joined lesson description
    pub description: Option<String>,
    /// Joined lesson image
    pub image: Option<String>,
    /// Joined lesson duration
    pub duration: Option<String>,
    /// Joined lesson schedule
    pub schedule: Option<String>,
    /// Joined lesson age range
    pub age_group: Option<String>,
    /// Joined category name
    pub category_name: Option<String>,
    /// Joined teacher name
    pub teacher_name: Option<String>,
    /// Joined teacher title
    pub teacher_title: Option<String>,
    /// Joined teacher avatar
    pub teacher_avatar: Option<String>,
}

fn validate_student_info(student: &StudentInfo) -> Result<()> {
    if student.student_name.trim().len() < 2 {
        return Err(Error::Validation {
            message: "Student name must be at least 2 characters".to_string(),
        });
    }
    if !(3..=18).contains(&student.student_age) {
        return Err(Error::Validation {
            message: "Student age must be between 3 and 18".to_string(),
        });
    }
    Ok(())
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn is_valid_expiry(s: &str) -> bool {
    // MM/YY with a month in 01..=12
    let Some((month, year)) = s.split_once('/') else {
        return false;
    };
    if month.len() != 2 || year.len() != 2 || !is_digits(month) || !is_digits(year) {
        return false;
    }
    matches!(month.parse::<u32>(), Ok(m) if (1..=12).contains(&m))
}

fn validate_payment_info(payment: &PaymentInfo) -> Result<()> {
    if payment.method != PaymentMethod::Card {
        return Ok(());
    }

    let number = payment.card_number.as_deref().unwrap_or("");
    if !is_digits(number) || !(13..=19).contains(&number.len()) {
        return Err(Error::Validation {
            message: "Invalid card number".to_string(),
        });
    }

    let expiry = payment.card_expiry.as_deref().unwrap_or("");
    if !is_valid_expiry(expiry) {
        return Err(Error::Validation {
            message: "Invalid expiry date (MM/YY)".to_string(),
        });
    }

    let cvv = payment.card_cvv.as_deref().unwrap_or("");
    if !is_digits(cvv) || !(3..=4).contains(&cvv.len()) {
        return Err(Error::Validation {
            message: "Invalid CVV".to_string(),
        });
    }

    if payment.cardholder_name.as_deref().unwrap_or("").trim().len() < 2 {
        return Err(Error::Validation {
            message: "Cardholder name must be at least 2 characters".to_string(),
        });
    }

    Ok(())
}

/// Converts the user's cart into confirmed enrollments.
///
/// The whole sequence runs in one transaction: validate rows, insert
/// enrollments as pending, commit seats through the conditional atomic
/// increment, clear the cart, then confirm every enrollment sharing the
/// payment id. A capacity refusal or store error rolls everything back;
/// there is no partially committed checkout.
pub async fn checkout(
    db: &DatabaseConnection,
    user_id: i64,
    student: &StudentInfo,
    payment: &PaymentInfo,
) -> Result<CheckoutReceipt> {
    validate_student_info(student)?;
    validate_payment_info(payment)?;

    let txn = db.begin().await?;

    let rows = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .all(&txn)
        .await?;
    if rows.is_empty() {
        return Err(Error::EmptyCart);
    }

    let lesson_ids: Vec<i64> = rows.iter().map(|r| r.lesson_id).collect();
    let lessons: HashMap<i64, lesson::Model> = Lesson::find()
        .filter(lesson::Column::Id.is_in(lesson_ids))
        .all(&txn)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    // Rows whose lesson vanished are a data-integrity tolerance, not an error
    let valid: Vec<(&cart_item::Model, &lesson::Model)> = rows
        .iter()
        .filter_map(|row| lessons.get(&row.lesson_id).map(|l| (row, l)))
        .collect();
    if valid.is_empty() {
        return Err(Error::InvalidCart);
    }

    for (_, lesson) in &valid {
        if !lesson.available {
            return Err(Error::Validation {
                message: format!("{} is no longer available", lesson.title),
            });
        }
    }

    let subtotal: f64 = valid
        .iter()
        .map(|(row, lesson)| lesson.price * f64::from(row.quantity))
        .sum();
    let tax = subtotal * TAX_RATE;

    let payment_id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now();
    let student_name = student.student_name.trim().to_string();

    let mut lines = Vec::with_capacity(valid.len());
    for (row, lesson) in &valid {
        let amount = lesson.price * f64::from(row.quantity);
        let created = enrollment::ActiveModel {
            user_id: Set(user_id),
            lesson_id: Set(lesson.id),
            student_name: Set(student_name.clone()),
            phone_number: Set(student.phone_number.clone()),
            student_age: Set(student.student_age),
            student_grade: Set(student.student_grade.clone()),
            special_notes: Set(student.special_notes.clone()),
            quantity: Set(row.quantity),
            total_amount: Set(amount),
            status: Set(EnrollmentStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            payment_method: Set(payment.method),
            payment_id: Set(payment_id.clone()),
            enrolled_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        // Re-validates capacity atomically; a refusal aborts the whole checkout
        increment_students_enrolled(&txn, lesson.id, row.quantity).await?;

        lines.push(EnrollmentLine {
            id: created.id,
            lesson_id: lesson.id,
            title: lesson.title.clone(),
            quantity: row.quantity,
            amount: round_to_cents(amount),
        });
    }

    CartItem::delete_many()
        .filter(cart_item::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    // Simulated payment: confirm everything sharing this checkout's id
    Enrollment::update_many()
        .set(enrollment::ActiveModel {
            status: Set(EnrollmentStatus::Confirmed),
            payment_status: Set(PaymentStatus::Paid),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(enrollment::Column::PaymentId.eq(payment_id.clone()))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    info!(
        user_id,
        payment_id = %payment_id,
        enrollment_count = lines.len(),
        "Checkout completed"
    );

    let summary = CheckoutSummary {
        subtotal: round_to_cents(subtotal),
        tax: round_to_cents(tax),
        total: round_to_cents(subtotal + tax),
        student_name,
        enrollment_count: lines.len(),
    };

    Ok(CheckoutReceipt {
        payment_id,
        enrollments: lines,
        summary,
    })
}

/// Cancels one of the caller's enrollments and releases its seats.
///
/// Terminal states are guarded: cancelling an already-cancelled or completed
/// enrollment fails with `InvalidState` and produces no side effect, so seats
/// are never decremented twice.
pub async fn cancel(
    db: &DatabaseConnection,
    user_id: i64,
    enrollment_id: i64,
    reason: Option<String>,
) -> Result<()> {
    let txn = db.begin().await?;

    // Non-owned ids read as missing so existence does not leak
    let found = Enrollment::find_by_id(enrollment_id)
        .filter(enrollment::Column::UserId.eq(user_id))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Enrollment".to_string(),
        })?;

    match found.status {
        EnrollmentStatus::Cancelled => {
            return Err(Error::InvalidState {
                message: "Enrollment is already cancelled".to_string(),
            });
        }
        EnrollmentStatus::Completed => {
            return Err(Error::InvalidState {
                message: "Cannot cancel completed enrollment".to_string(),
            });
        }
        EnrollmentStatus::Pending | EnrollmentStatus::Confirmed => {}
    }

    let lesson_id = found.lesson_id;
    let quantity = found.quantity;

    let notes = reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "Cancelled by user".to_string());

    let mut active: enrollment::ActiveModel = found.into();
    active.status = Set(EnrollmentStatus::Cancelled);
    active.special_notes = Set(Some(notes));
    active.updated_at = Set(chrono::Utc::now());
    active.update(&txn).await?;

    decrement_students_enrolled(&txn, lesson_id, quantity).await?;

    txn.commit().await?;

    info!(user_id, enrollment_id, "Enrollment cancelled");
    Ok(())
}

async fn load_enrollment_refs(
    db: &DatabaseConnection,
    enrollments: &[enrollment::Model],
) -> Result<(
    HashMap<i64, lesson::Model>,
    HashMap<i64, category::Model>,
    HashMap<i64, teacher::Model>,
)> {
    let lesson_ids: Vec<i64> = enrollments.iter().map(|e| e.lesson_id).collect();
    let lessons: HashMap<i64, lesson::Model> = Lesson::find()
        .filter(lesson::Column::Id.is_in(lesson_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    let category_ids: Vec<i64> = lessons.values().map(|l| l.category_id).collect();
    let teacher_ids: Vec<i64> = lessons.values().map(|l| l.teacher_id).collect();

    let categories = Category::find()
        .filter(category::Column::Id.is_in(category_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    let teachers = Teacher::find()
        .filter(teacher::Column::Id.is_in(teacher_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();

    Ok((lessons, categories, teachers))
}

fn to_view(
    e: enrollment::Model,
    lessons: &HashMap<i64, lesson::Model>,
    categories: &HashMap<i64, category::Model>,
    teachers: &HashMap<i64, teacher::Model>,
) -> EnrollmentView {
    let lesson = lessons.get(&e.lesson_id);
    let category = lesson.and_then(|l| categories.get(&l.category_id));
    let teacher = lesson.and_then(|l| teachers.get(&l.teacher_id));

    EnrollmentView {
        id: e.id,
        user_id: e.user_id,
        lesson_id: e.lesson_id,
        student_name: e.student_name,
        student_age: e.student_age,
        student_grade: e.student_grade,
        special_notes: e.special_notes,
        quantity: e.quantity,
        total_amount: e.total_amount,
        status: e.status,
        payment_status: e.payment_status,
        payment_method: e.payment_method,
        payment_id: e.payment_id,
        enrolled_at: e.enrolled_at,
        title: lesson.map(|l| l.title.clone()),
        description: lesson.map(|l| l.description.clone()),
        image: lesson.and_then(|l| l.image.clone()),
        duration: lesson.map(|l| l.duration.clone()),
        schedule: lesson.map(|l| l.schedule.clone()),
        age_group: lesson.map(|l| l.age_group.clone()),
        category_name: category.map(|c| c.name.clone()),
        teacher_name: teacher.map(|t| t.name.clone()),
        teacher_title: teacher.map(|t| t.title.clone()),
        teacher_avatar: teacher.and_then(|t| t.avatar.clone()),
    }
}

/// Lists the caller's enrollments, newest first, optionally by status.
pub async fn list_enrollments(
    db: &DatabaseConnection,
    user_id: i64,
    status: Option<EnrollmentStatus>,
    page: u64,
    page_size: u64,
) -> Result<Page<EnrollmentView>> {
    let mut query = Enrollment::find().filter(enrollment::Column::UserId.eq(user_id));
    if let Some(status) = status {
        query = query.filter(enrollment::Column::Status.eq(status));
    }

    let total = query.clone().count(db).await?;
    let pagination = Pagination::new(page, page_size, total);

    let enrollments = query
        .order_by_desc(enrollment::Column::EnrolledAt)
        .offset(pagination.offset())
        .limit(pagination.items_per_page)
        .all(db)
        .await?;

    let (lessons, categories, teachers) = load_enrollment_refs(db, &enrollments).await?;
    let items = enrollments
        .into_iter()
        .map(|e| to_view(e, &lessons, &categories, &teachers))
        .collect();

    Ok(Page { items, pagination })
}

/// Fetches one of the caller's enrollments; non-owned ids read as missing.
pub async fn get_enrollment(
    db: &DatabaseConnection,
    user_id: i64,
    enrollment_id: i64,
) -> Result<EnrollmentView> {
    let found = Enrollment::find_by_id(enrollment_id)
        .filter(enrollment::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Enrollment".to_string(),
        })?;

    let (lessons, categories, teachers) =
        load_enrollment_refs(db, std::slice::from_ref(&found)).await?;
    Ok(to_view(found, &lessons, &categories, &teachers))
}

/// Aggregates the caller's enrollment counts and paid spend.
pub async fn summary(db: &DatabaseConnection, user_id: i64) -> Result<EnrollmentSummary> {
    let enrollments = Enrollment::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .all(db)
        .await?;

    let count_status = |status: EnrollmentStatus| -> u64 {
        enrollments.iter().filter(|e| e.status == status).count() as u64
    };

    // Paid-only: the summary reports actual revenue, not intent
    let total_spent: f64 = enrollments
        .iter()
        .filter(|e| e.payment_status == PaymentStatus::Paid)
        .map(|e| e.total_amount)
        .sum();

    Ok(EnrollmentSummary {
        total_enrollments: enrollments.len() as u64,
        confirmed_enrollments: count_status(EnrollmentStatus::Confirmed),
        pending_enrollments: count_status(EnrollmentStatus::Pending),
        cancelled_enrollments: count_status(EnrollmentStatus::Cancelled),
        completed_enrollments: count_status(EnrollmentStatus::Completed),
        total_spent: round_to_cents(total_spent),
    })
}
