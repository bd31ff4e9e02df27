//! User entity - Represents an account in the marketplace.
//!
//! Each user has a role that gates what they may do: parents and students
//! shop and enroll, teachers manage their own listings, admins manage
//! categories and users. The password hash is opaque to this crate; hashing
//! and verification live in the external identity service.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account role, stored as a lowercase string column
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Role {
    /// Browses, buys, and enrolls children
    #[sea_orm(string_value = "parent")]
    Parent,
    /// Enrolled learner account
    #[sea_orm(string_value = "student")]
    Student,
    /// Manages lesson listings
    #[sea_orm(string_value = "teacher")]
    Teacher,
    /// Manages categories and users
    #[sea_orm(string_value = "admin")]
    Admin,
}

/// User database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Login email, unique across accounts
    #[sea_orm(unique)]
    pub email: String,
    /// Opaque password hash owned by the identity service
    pub password_hash: String,
    /// Role gating authorization checks
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

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many cart rows
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    /// One user has many enrollments
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollments,
    /// One user has many reviews
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
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
