//! Shared test utilities for the marketplace crate.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    auth::Identity,
    core::cart,
    core::checkout::{self, CheckoutReceipt, PaymentInfo, StudentInfo},
    core::lesson::{self, NewLesson},
    entities::{self, Lesson, PaymentMethod, PriceUnit, Role},
    errors::Result,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// An admin caller for gated operations.
pub fn admin_identity() -> Identity {
    Identity::new(1, Role::Admin)
}

/// A teacher caller for gated operations.
pub fn teacher_identity() -> Identity {
    Identity::new(2, Role::Teacher)
}

/// A plain parent caller.
pub fn parent_identity() -> Identity {
    Identity::new(3, Role::Parent)
}

/// Creates a test user with the parent role.
///
/// The email is derived from the name, so distinct names stay unique.
pub async fn create_test_user(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::user::Model> {
    create_test_user_with_role(db, name, Role::Parent).await
}

/// Creates a test user with a specific role.
pub async fn create_test_user_with_role(
    db: &DatabaseConnection,
    name: &str,
    role: Role,
) -> Result<entities::user::Model> {
    let now = chrono::Utc::now();
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
    let user = entities::user::ActiveModel {
        name: Set(name.to_string()),
        email: Set(email),
        password_hash: Set("test-hash".to_string()),
        role: Set(role),
        phone: Set(None),
        address: Set(None),
        city: Set(None),
        state: Set(None),
        zip: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    user.insert(db).await.map_err(Into::into)
}

/// Creates a test category with empty description and icon.
pub async fn create_test_category(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::category::Model> {
    let now = chrono::Utc::now();
    let category = entities::category::ActiveModel {
        name: Set(name.to_string()),
        description: Set(String::new()),
        icon: Set(String::new()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    category.insert(db).await.map_err(Into::into)
}

/// Creates a test teacher with sensible defaults.
pub async fn create_test_teacher(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::teacher::Model> {
    let now = chrono::Utc::now();
    let teacher = entities::teacher::ActiveModel {
        user_id: Set(None),
        name: Set(name.to_string()),
        title: Set("Instructor".to_string()),
        avatar: Set(None),
        bio: Set(None),
        credentials: Set(None),
        experience_years: Set(5),
        rating: Set(0.0),
        total_reviews: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    teacher.insert(db).await.map_err(Into::into)
}

/// Builds a valid `NewLesson` with test defaults.
///
/// # Defaults
/// * `price`: 45.0 per session
/// * `max_students`: 20
/// * not featured, no image, no features
pub fn new_test_lesson(title: &str, category_id: i64, teacher_id: i64) -> NewLesson {
    NewLesson {
        title: title.to_string(),
        category_id,
        teacher_id,
        price: 45.0,
        price_unit: PriceUnit::Session,
        duration: "60 min".to_string(),
        schedule: "Mon & Wed 4pm".to_string(),
        age_group: "6-10 years".to_string(),
        description: "A welcoming class for beginners.".to_string(),
        image: None,
        features: Vec::new(),
        max_students: 20,
        featured: false,
    }
}

/// Creates a test lesson with the standard defaults.
pub async fn create_test_lesson(
    db: &DatabaseConnection,
    title: &str,
    category_id: i64,
    teacher_id: i64,
) -> Result<entities::lesson::Model> {
    lesson::create_lesson(db, &admin_identity(), new_test_lesson(title, category_id, teacher_id))
        .await
}

/// Creates a test lesson with a custom price and capacity.
pub async fn create_custom_lesson(
    db: &DatabaseConnection,
    title: &str,
    category_id: i64,
    teacher_id: i64,
    price: f64,
    max_students: i32,
) -> Result<entities::lesson::Model> {
    let mut new_lesson = new_test_lesson(title, category_id, teacher_id);
    new_lesson.price = price;
    new_lesson.max_students = max_students;
    lesson::create_lesson(db, &admin_identity(), new_lesson).await
}

/// Flips a lesson's availability directly, bypassing the service layer.
pub async fn set_lesson_available(
    db: &DatabaseConnection,
    lesson_id: i64,
    available: bool,
) -> Result<()> {
    let mut active: entities::lesson::ActiveModel = Lesson::find_by_id(lesson_id)
        .one(db)
        .await?
        .ok_or_else(|| crate::errors::Error::NotFound {
            what: "Lesson".to_string(),
        })?
        .into();
    active.available = Set(available);
    active.update(db).await?;
    Ok(())
}

/// Sets a lesson's rating directly, bypassing the review service.
pub async fn set_lesson_rating(db: &DatabaseConnection, lesson_id: i64, rating: f64) -> Result<()> {
    let mut active: entities::lesson::ActiveModel = Lesson::find_by_id(lesson_id)
        .one(db)
        .await?
        .ok_or_else(|| crate::errors::Error::NotFound {
            what: "Lesson".to_string(),
        })?
        .into();
    active.rating = Set(rating);
    active.update(db).await?;
    Ok(())
}

/// Valid student details for checkout tests.
pub fn test_student_info() -> StudentInfo {
    StudentInfo {
        student_name: "Jordan Kim".to_string(),
        phone_number: Some("5550100200".to_string()),
        student_age: 10,
        student_grade: Some("5th".to_string()),
        special_notes: None,
    }
}

/// Valid payment details for checkout tests (PayPal, no card fields).
pub fn test_payment_info() -> PaymentInfo {
    PaymentInfo {
        method: PaymentMethod::Paypal,
        card_number: None,
        card_expiry: None,
        card_cvv: None,
        cardholder_name: None,
    }
}

/// Sets up a database with a catalog skeleton: one category, one teacher.
pub async fn setup_catalog() -> Result<(
    DatabaseConnection,
    entities::category::Model,
    entities::teacher::Model,
)> {
    let db = setup_test_db().await?;
    let category = create_test_category(&db, "Music").await?;
    let teacher = create_test_teacher(&db, "Dana Reyes").await?;
    Ok((db, category, teacher))
}

/// Sets up a complete test environment with a parent user and one lesson.
/// Returns (db, user, lesson) for common shopping scenarios.
pub async fn setup_with_lesson() -> Result<(
    DatabaseConnection,
    entities::user::Model,
    entities::lesson::Model,
)> {
    let (db, category, teacher) = setup_catalog().await?;
    let user = create_test_user(&db, "Test Parent").await?;
    let lesson = create_test_lesson(&db, "Guitar Basics", category.id, teacher.id).await?;
    Ok((db, user, lesson))
}

/// Puts a lesson in the user's cart and checks out immediately.
pub async fn enroll_test_user(
    db: &DatabaseConnection,
    user_id: i64,
    lesson_id: i64,
    quantity: i32,
) -> Result<CheckoutReceipt> {
    cart::add_item(db, user_id, lesson_id, quantity).await?;
    checkout::checkout(db, user_id, &test_student_info(), &test_payment_info()).await
}
