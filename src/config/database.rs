//! Database configuration module for the marketplace.
//!
//! This module handles `SQLite` database connection and table creation using
//! `SeaORM`. Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! struct definitions without manual SQL. The two composite unique indexes
//! the entities cannot express (one cart row and one review per
//! (user, lesson) pair) are created explicitly with `sea_query::Index`.

use crate::entities::{CartItem, Category, Enrollment, Lesson, Review, Teacher, User, cart_item, review};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Gets the database URL from environment variable or returns default `SQLite` path.
pub fn get_database_url() -> Result<String> {
    Ok(std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://data/lesson_market.sqlite?mode=rwc".to_string()))
}

/// Establishes a connection to the `SQLite` database using the `DATABASE_URL`
/// environment variable, falling back to a local `SQLite` file.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url()?;
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all tables and indexes required by the marketplace.
///
/// Safe to call on an existing database: every statement carries
/// `IF NOT EXISTS`.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut user_table = schema.create_table_from_entity(User);
    let mut teacher_table = schema.create_table_from_entity(Teacher);
    let mut category_table = schema.create_table_from_entity(Category);
    let mut lesson_table = schema.create_table_from_entity(Lesson);
    let mut cart_item_table = schema.create_table_from_entity(CartItem);
    let mut enrollment_table = schema.create_table_from_entity(Enrollment);
    let mut review_table = schema.create_table_from_entity(Review);

    db.execute(builder.build(user_table.if_not_exists())).await?;
    db.execute(builder.build(teacher_table.if_not_exists())).await?;
    db.execute(builder.build(category_table.if_not_exists())).await?;
    db.execute(builder.build(lesson_table.if_not_exists())).await?;
    db.execute(builder.build(cart_item_table.if_not_exists())).await?;
    db.execute(builder.build(enrollment_table.if_not_exists())).await?;
    db.execute(builder.build(review_table.if_not_exists())).await?;

    let mut cart_unique = Index::create()
        .name("idx_cart_items_user_lesson")
        .table(CartItem)
        .col(cart_item::Column::UserId)
        .col(cart_item::Column::LessonId)
        .unique()
        .to_owned();
    db.execute(builder.build(cart_unique.if_not_exists())).await?;

    let mut review_unique = Index::create()
        .name("idx_reviews_user_lesson")
        .table(Review)
        .col(review::Column::UserId)
        .col(review::Column::LessonId)
        .unique()
        .to_owned();
    db.execute(builder.build(review_unique.if_not_exists())).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        cart_item::Model as CartItemModel, category::Model as CategoryModel,
        enrollment::Model as EnrollmentModel, lesson::Model as LessonModel,
        review::Model as ReviewModel, teacher::Model as TeacherModel, user::Model as UserModel,
    };
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_connection() -> Result<()> {
        // Use in-memory database for testing to avoid touching a real file
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that we can execute a query to verify the connection is working
        let _: Vec<LessonModel> = Lesson::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<TeacherModel> = Teacher::find().limit(1).all(&db).await?;
        let _: Vec<CategoryModel> = Category::find().limit(1).all(&db).await?;
        let _: Vec<LessonModel> = Lesson::find().limit(1).all(&db).await?;
        let _: Vec<CartItemModel> = CartItem::find().limit(1).all(&db).await?;
        let _: Vec<EnrollmentModel> = Enrollment::find().limit(1).all(&db).await?;
        let _: Vec<ReviewModel> = Review::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
