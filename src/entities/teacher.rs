//! Teacher entity - Represents an instructor offering lessons.
//!
//! The rating and review totals are derived values: the review service
//! recomputes them whenever a review lands on one of the teacher's lessons.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Teacher database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "teachers")]
pub struct Model {
    /// Unique identifier for the teacher
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user account, if the teacher logs in themselves
    pub user_id: Option<i64>,
    /// Display name
    pub name: String,
    /// Professional title (e.g., "Piano Instructor")
    pub title: String,
    /// Avatar image URL
    pub avatar: Option<String>,
    /// Short biography
    pub bio: Option<String>,
    /// Certifications and credentials
    pub credentials: Option<String>,
    /// Years of teaching experience
    pub experience_years: i32,
    /// Mean rating across reviews of this teacher's lessons (derived)
    pub rating: f64,
    /// Count of reviews across this teacher's lessons (derived)
    pub total_reviews: i32,
    /// When the teacher profile was created
    pub created_at: DateTimeUtc,
    /// When the teacher profile was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Teacher and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One teacher offers many lessons
    #[sea_orm(has_many = "super::lesson::Entity")]
    Lessons,
}

impl Related<super::lesson::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lessons.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
