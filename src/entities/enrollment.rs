//! Enrollment entity - A committed purchase of one lesson for one student.
//!
//! Enrollments are created only during checkout and are never deleted.
//! The status lifecycle is `pending -> confirmed -> {cancelled, completed}`;
//! `cancelled` and `completed` are terminal. All enrollments produced by one
//! checkout call share a `payment_id` correlation identifier.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Enrollment lifecycle status, stored as a lowercase string column
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum EnrollmentStatus {
    /// Created during checkout, not yet confirmed
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Payment settled, seat committed
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    /// Cancelled by the user, seat released (terminal)
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Lessons finished (terminal)
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// Payment settlement status, stored as a lowercase string column
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PaymentStatus {
    /// Awaiting settlement
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Settled
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Settlement failed
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Refunded after settlement
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

/// How the checkout was paid, stored as a lowercase string column
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PaymentMethod {
    /// Credit or debit card
    #[sea_orm(string_value = "card")]
    Card,
    /// PayPal
    #[sea_orm(string_value = "paypal")]
    Paypal,
    /// Bank transfer
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
}

/// Enrollment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    /// Unique identifier for the enrollment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Purchasing user
    pub user_id: i64,
    /// Lesson enrolled into
    pub lesson_id: i64,
    /// Name of the attending student
    pub student_name: String,
    /// Contact phone supplied at checkout
    pub phone_number: Option<String>,
    /// Age of the attending student, 3 to 18
    pub student_age: i32,
    /// School grade of the attending student
    pub student_grade: Option<String>,
    /// Free-form notes; overwritten with the reason on cancellation
    pub special_notes: Option<String>,
    /// Seats purchased, at least 1
    pub quantity: i32,
    /// Price x quantity at checkout time
    pub total_amount: f64,
    /// Lifecycle status
    pub status: EnrollmentStatus,
    /// Payment settlement status
    pub payment_status: PaymentStatus,
    /// How the checkout was paid
    pub payment_method: PaymentMethod,
    /// Correlation id shared by all enrollments of one checkout
    pub payment_id: String,
    /// When the enrollment was created
    pub enrolled_at: DateTimeUtc,
    /// When the row was created
    pub created_at: DateTimeUtc,
    /// When the row was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Enrollment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each enrollment belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// Each enrollment references one lesson
    #[sea_orm(
        belongs_to = "super::lesson::Entity",
        from = "Column::LessonId",
        to = "super::lesson::Column::Id"
    )]
    Lesson,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::lesson::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lesson.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
