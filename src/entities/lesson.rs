//! Lesson entity - A purchasable recurring class offering.
//!
//! `students_enrolled` is the sole capacity-tracking mechanism: checkout
//! increments it, cancellation decrements it, and the invariant
//! `0 <= students_enrolled <= max_students` must hold at every committed
//! boundary. `rating` and `review_count` are derived from reviews.

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Unit the price is quoted in, stored as a lowercase string column
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PriceUnit {
    /// Price per hour of instruction
    #[sea_orm(string_value = "hour")]
    Hour,
    /// Price per session
    #[sea_orm(string_value = "session")]
    Session,
    /// Price per calendar month
    #[sea_orm(string_value = "month")]
    Month,
}

/// Ordered list of selling points, stored as a JSON column
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Features(pub Vec<String>);

/// Lesson database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lessons")]
pub struct Model {
    /// Unique identifier for the lesson
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Lesson title
    pub title: String,
    /// Category this lesson is listed under
    pub category_id: i64,
    /// Teacher offering this lesson
    pub teacher_id: i64,
    /// Price per `price_unit` in dollars
    pub price: f64,
    /// Unit the price is quoted in
    pub price_unit: PriceUnit,
    /// Mean rating across this lesson's reviews (derived)
    pub rating: f64,
    /// Count of this lesson's reviews (derived)
    pub review_count: i32,
    /// Human-readable duration (e.g., "60 min")
    pub duration: String,
    /// Human-readable schedule (e.g., "Mon & Wed 4pm")
    pub schedule: String,
    /// Target age range (e.g., "6-10 years")
    pub age_group: String,
    /// Seats currently committed by enrollments
    pub students_enrolled: i32,
    /// Seat capacity
    pub max_students: i32,
    /// Full description shown on the detail page
    pub description: String,
    /// Cover image URL
    pub image: Option<String>,
    /// Ordered list of selling points
    #[sea_orm(column_type = "Json")]
    pub features: Features,
    /// Whether the lesson is promoted on the landing page
    pub featured: bool,
    /// Whether the lesson can be added to carts and checked out
    pub available: bool,
    /// When the lesson was created
    pub created_at: DateTimeUtc,
    /// When the lesson was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Lesson and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each lesson belongs to one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    /// Each lesson belongs to one teacher
    #[sea_orm(
        belongs_to = "super::teacher::Entity",
        from = "Column::TeacherId",
        to = "super::teacher::Column::Id"
    )]
    Teacher,
    /// One lesson appears in many carts
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    /// One lesson has many enrollments
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollments,
    /// One lesson has many reviews
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
