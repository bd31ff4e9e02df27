//! Cart business logic - per-user (lesson, quantity) rows with capacity checks.
//!
//! Cart rows hold no capacity: the check here is advisory against the
//! lesson's current counter so shoppers learn early that a class is full,
//! while the binding check happens atomically at checkout. One row per
//! (user, lesson) pair; adding the same lesson again sums quantities.

use crate::{
    entities::{CartItem, Category, Lesson, PriceUnit, Teacher, cart_item, category, lesson, teacher},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use std::collections::HashMap;

/// Fixed sales-tax rate applied to cart and checkout totals.
pub const TAX_RATE: f64 = 0.10;

/// Rounds a dollar amount to cents. Applied only at presentation
/// boundaries, never to intermediate arithmetic.
#[must_use]
pub(crate) fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// One cart row denormalized with its lesson, category, and teacher.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CartItemView {
    /// Cart row id
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Lesson in the cart
    pub lesson_id: i64,
    /// Seats requested
    pub quantity: i32,
    /// Lesson title
    pub title: String,
    /// Lesson price per unit
    pub price: f64,
    /// Unit the price is quoted in
    pub price_unit: PriceUnit,
    /// Lesson duration
    pub duration: String,
    /// Lesson schedule
    pub schedule: String,
    /// Lesson age range
    pub age_group: String,
    /// Lesson cover image
    pub image: Option<String>,
    /// Lesson description
    pub description: String,
    /// Joined category name
    pub category_name: Option<String>,
    /// Joined teacher name
    pub teacher_name: Option<String>,
    /// Joined teacher title
    pub teacher_title: Option<String>,
    /// Joined teacher avatar
    pub teacher_avatar: Option<String>,
    /// When the row was created
    pub created_at: DateTimeUtc,
}

/// Monetary totals for a cart, rounded to cents.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CartSummary {
    /// Sum of price x quantity
    pub subtotal: f64,
    /// `subtotal x 0.10`
    pub tax: f64,
    /// `subtotal + tax`
    pub total: f64,
    /// Sum of quantities
    pub item_count: i64,
}

/// The cart payload: denormalized rows plus totals.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CartView {
    /// Rows, newest first
    pub items: Vec<CartItemView>,
    /// Totals over the rows
    pub summary: CartSummary,
}

fn validate_quantity(quantity: i32) -> Result<()> {
    if quantity < 1 {
        return Err(Error::Validation {
            message: "Quantity must be a positive integer".to_string(),
        });
    }
    Ok(())
}

/// Loads an available lesson or reports it missing.
async fn get_available_lesson(db: &DatabaseConnection, lesson_id: i64) -> Result<lesson::Model> {
    Lesson::find_by_id(lesson_id)
        .one(db)
        .await?
        .filter(|l| l.available)
        .ok_or_else(|| Error::NotFound {
            what: "Lesson".to_string(),
        })
}

/// Checks the requested total against the lesson's current seat counter.
fn check_capacity(lesson: &lesson::Model, requested_total: i32) -> Result<()> {
    if lesson.students_enrolled + requested_total > lesson.max_students {
        return Err(Error::CapacityExceeded {
            available: (lesson.max_students - lesson.students_enrolled).max(0),
        });
    }
    Ok(())
}

/// Adds a lesson to the user's cart, summing quantities on repeat adds.
///
/// Fails with `NotFound` if the lesson is missing or unavailable, and with
/// `CapacityExceeded` if the (new) total quantity cannot fit the lesson's
/// remaining seats.
pub async fn add_item(
    db: &DatabaseConnection,
    user_id: i64,
    lesson_id: i64,
    quantity: i32,
) -> Result<cart_item::Model> {
    validate_quantity(quantity)?;
    let lesson = get_available_lesson(db, lesson_id).await?;
    check_capacity(&lesson, quantity)?;

    let existing = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .filter(cart_item::Column::LessonId.eq(lesson_id))
        .one(db)
        .await?;

    let now = chrono::Utc::now();
    if let Some(existing) = existing {
        let new_quantity = existing.quantity + quantity;
        // Re-check with the summed quantity
        check_capacity(&lesson, new_quantity)?;

        let mut item: cart_item::ActiveModel = existing.into();
        item.quantity = Set(new_quantity);
        item.updated_at = Set(now);
        item.update(db).await.map_err(Into::into)
    } else {
        let item = cart_item::ActiveModel {
            user_id: Set(user_id),
            lesson_id: Set(lesson_id),
            quantity: Set(quantity),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        item.insert(db).await.map_err(Into::into)
    }
}

/// Replaces the quantity of an existing cart row.
pub async fn update_item(
    db: &DatabaseConnection,
    user_id: i64,
    lesson_id: i64,
    quantity: i32,
) -> Result<cart_item::Model> {
    validate_quantity(quantity)?;
    let lesson = get_available_lesson(db, lesson_id).await?;
    check_capacity(&lesson, quantity)?;

    let existing = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .filter(cart_item::Column::LessonId.eq(lesson_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Cart item".to_string(),
        })?;

    let mut item: cart_item::ActiveModel = existing.into();
    item.quantity = Set(quantity);
    item.updated_at = Set(chrono::Utc::now());
    item.update(db).await.map_err(Into::into)
}

/// Removes one lesson from the user's cart.
pub async fn remove_item(db: &DatabaseConnection, user_id: i64, lesson_id: i64) -> Result<()> {
    let existing = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .filter(cart_item::Column::LessonId.eq(lesson_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Cart item".to_string(),
        })?;

    existing.delete(db).await?;
    Ok(())
}

/// Deletes every cart row the user owns.
pub async fn clear_cart(db: &DatabaseConnection, user_id: i64) -> Result<()> {
    CartItem::delete_many()
        .filter(cart_item::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Returns the user's cart rows, newest first, with totals.
///
/// Rows whose lesson has vanished are skipped rather than failing the whole
/// cart; checkout applies the same tolerance.
pub async fn get_cart(db: &DatabaseConnection, user_id: i64) -> Result<CartView> {
    let rows = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .order_by_desc(cart_item::Column::CreatedAt)
        .all(db)
        .await?;

    let lesson_ids: Vec<i64> = rows.iter().map(|r| r.lesson_id).collect();
    let lessons: HashMap<i64, lesson::Model> = Lesson::find()
        .filter(lesson::Column::Id.is_in(lesson_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    let present: Vec<lesson::Model> = lessons.values().cloned().collect();
    let (categories, teachers) = load_cart_refs(db, &present).await?;

    let mut items = Vec::with_capacity(rows.len());
    let mut subtotal = 0.0;
    let mut item_count: i64 = 0;

    for row in rows {
        let Some(lesson) = lessons.get(&row.lesson_id) else {
            continue;
        };
        subtotal += lesson.price * f64::from(row.quantity);
        item_count += i64::from(row.quantity);

        let category = categories.get(&lesson.category_id);
        let teacher = teachers.get(&lesson.teacher_id);
        items.push(CartItemView {
            id: row.id,
            user_id: row.user_id,
            lesson_id: row.lesson_id,
            quantity: row.quantity,
            title: lesson.title.clone(),
            price: lesson.price,
            price_unit: lesson.price_unit,
            duration: lesson.duration.clone(),
            schedule: lesson.schedule.clone(),
            age_group: lesson.age_group.clone(),
            image: lesson.image.clone(),
            description: lesson.description.clone(),
            category_name: category.map(|c| c.name.clone()),
            teacher_name: teacher.map(|t| t.name.clone()),
            teacher_title: teacher.map(|t| t.title.clone()),
            teacher_avatar: teacher.and_then(|t| t.avatar.clone()),
            created_at: row.created_at,
        });
    }

    let tax = subtotal * TAX_RATE;
    Ok(CartView {
        items,
        summary: CartSummary {
            subtotal: round_to_cents(subtotal),
            tax: round_to_cents(tax),
            total: round_to_cents(subtotal + tax),
            item_count,
        },
    })
}

async fn load_cart_refs(
    db: &DatabaseConnection,
    lessons: &[lesson::Model],
) -> Result<(HashMap<i64, category::Model>, HashMap<i64, teacher::Model>)> {
    let category_ids: Vec<i64> = lessons.iter().map(|l| l.category_id).collect();
    let teacher_ids: Vec<i64> = lessons.iter().map(|l| l.teacher_id).collect();

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

    Ok((categories, teachers))
}

/// Sum of quantities across the user's cart rows; 0 when empty.
pub async fn cart_count(db: &DatabaseConnection, user_id: i64) -> Result<i64> {
    let rows = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .all(db)
        .await?;

    Ok(rows.iter().map(|r| i64::from(r.quantity)).sum())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::{
        create_custom_lesson, create_test_category, create_test_lesson, create_test_teacher,
        create_test_user, setup_test_db, setup_with_lesson,
    };
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_round_to_cents() {
        assert_eq!(round_to_cents(150.0), 150.0);
        assert_eq!(round_to_cents(15.000_000_000_000_002), 15.0);
        assert_eq!(round_to_cents(10.005), 10.01);
        assert_eq!(round_to_cents(0.1 + 0.2), 0.3);
    }

    #[tokio::test]
    async fn test_add_item_rejects_zero_quantity() -> Result<()> {
        // Validation fires before any query, so a mock connection suffices
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = add_item(&db, 1, 1, 0).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let result = update_item(&db, 1, 1, -3).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_add_item_missing_or_unavailable_lesson() -> Result<()> {
        let (db, user, lesson) = setup_with_lesson().await?;

        let result = add_item(&db, user.id, 999, 1).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        crate::test_utils::set_lesson_available(&db, lesson.id, false).await?;
        let result = add_item(&db, user.id, lesson.id, 1).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_add_item_sums_quantities_for_same_lesson() -> Result<()> {
        let (db, user, lesson) = setup_with_lesson().await?;

        add_item(&db, user.id, lesson.id, 1).await?;
        let updated = add_item(&db, user.id, lesson.id, 2).await?;
        assert_eq!(updated.quantity, 3);

        // Still a single row
        assert_eq!(cart_count(&db, user.id).await?, 3);
        let cart = get_cart(&db, user.id).await?;
        assert_eq!(cart.items.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_add_item_capacity_message_counts_remaining_spots() -> Result<()> {
        let db = setup_test_db().await?;
        let category = create_test_category(&db, "Music").await?;
        let teacher = create_test_teacher(&db, "Dana Reyes").await?;
        let user = create_test_user(&db, "Avery Parent").await?;
        let lesson = create_custom_lesson(&db, "Guitar Basics", category.id, teacher.id, 45.0, 20)
            .await?;

        // 19 of 20 seats committed
        crate::core::lesson::increment_students_enrolled(&db, lesson.id, 19).await?;

        let result = add_item(&db, user.id, lesson.id, 2).await;
        let err = result.unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { available: 1 }));
        assert_eq!(err.to_string(), "Only 1 spots available");

        Ok(())
    }

    #[tokio::test]
    async fn test_add_item_recheck_on_summed_quantity() -> Result<()> {
        let db = setup_test_db().await?;
        let category = create_test_category(&db, "Music").await?;
        let teacher = create_test_teacher(&db, "Dana Reyes").await?;
        let user = create_test_user(&db, "Avery Parent").await?;
        let lesson =
            create_custom_lesson(&db, "Guitar Basics", category.id, teacher.id, 45.0, 3).await?;

        add_item(&db, user.id, lesson.id, 2).await?;

        // 2 in cart + 2 more would exceed the 3-seat capacity
        let result = add_item(&db, user.id, lesson.id, 2).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::CapacityExceeded { available: 3 }
        ));

        // The existing row is untouched
        assert_eq!(cart_count(&db, user.id).await?, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_item_requires_existing_row() -> Result<()> {
        let (db, user, lesson) = setup_with_lesson().await?;

        let result = update_item(&db, user.id, lesson.id, 2).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        add_item(&db, user.id, lesson.id, 1).await?;
        let updated = update_item(&db, user.id, lesson.id, 4).await?;
        assert_eq!(updated.quantity, 4);

        Ok(())
    }

    #[tokio::test]
    async fn test_remove_and_clear() -> Result<()> {
        let db = setup_test_db().await?;
        let category = create_test_category(&db, "Music").await?;
        let teacher = create_test_teacher(&db, "Dana Reyes").await?;
        let user = create_test_user(&db, "Avery Parent").await?;
        let guitar = create_test_lesson(&db, "Guitar Basics", category.id, teacher.id).await?;
        let violin = create_test_lesson(&db, "Violin Basics", category.id, teacher.id).await?;

        add_item(&db, user.id, guitar.id, 1).await?;
        add_item(&db, user.id, violin.id, 2).await?;

        remove_item(&db, user.id, guitar.id).await?;
        assert_eq!(cart_count(&db, user.id).await?, 2);

        let result = remove_item(&db, user.id, guitar.id).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        clear_cart(&db, user.id).await?;
        assert_eq!(cart_count(&db, user.id).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_get_cart_summary_totals() -> Result<()> {
        let db = setup_test_db().await?;
        let category = create_test_category(&db, "Music").await?;
        let teacher = create_test_teacher(&db, "Dana Reyes").await?;
        let user = create_test_user(&db, "Avery Parent").await?;
        let guitar =
            create_custom_lesson(&db, "Guitar Basics", category.id, teacher.id, 45.0, 20).await?;
        let violin =
            create_custom_lesson(&db, "Violin Basics", category.id, teacher.id, 60.0, 20).await?;

        add_item(&db, user.id, guitar.id, 2).await?;
        add_item(&db, user.id, violin.id, 1).await?;

        let cart = get_cart(&db, user.id).await?;
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.summary.subtotal, 150.0);
        assert_eq!(cart.summary.tax, 15.0);
        assert_eq!(cart.summary.total, 165.0);
        assert_eq!(cart.summary.item_count, 3);

        // Newest row first
        assert_eq!(cart.items[0].lesson_id, violin.id);
        assert_eq!(cart.items[0].category_name.as_deref(), Some("Music"));
        assert_eq!(cart.items[0].teacher_name.as_deref(), Some("Dana Reyes"));

        Ok(())
    }

    #[tokio::test]
    async fn test_get_cart_empty() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "Avery Parent").await?;

        let cart = get_cart(&db, user.id).await?;
        assert!(cart.items.is_empty());
        assert_eq!(cart.summary.subtotal, 0.0);
        assert_eq!(cart.summary.item_count, 0);
        assert_eq!(cart_count(&db, user.id).await?, 0);

        Ok(())
    }
}
