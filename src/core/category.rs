//! Category business logic - CRUD with referential guards.
//!
//! Categories organize the catalog. Names are unique case-insensitively,
//! and a category cannot be deleted while lessons still reference it.

use crate::{
    auth::Identity,
    entities::{Category, Lesson, category, lesson},
    errors::{Error, Result},
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*};

/// A category annotated with a live count of its available lessons.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CategoryView {
    /// Category id
    pub id: i64,
    /// Category name
    pub name: String,
    /// Short description
    pub description: String,
    /// Icon name or URL
    pub icon: String,
    /// Number of available lessons listed under this category
    pub lesson_count: u64,
    /// When the category was created
    pub created_at: DateTimeUtc,
}

/// Typed partial update for a category; unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New icon
    pub icon: Option<String>,
}

impl CategoryUpdate {
    /// True when no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.icon.is_none()
    }
}

async fn available_lesson_count(db: &DatabaseConnection, category_id: i64) -> Result<u64> {
    Lesson::find()
        .filter(lesson::Column::CategoryId.eq(category_id))
        .filter(lesson::Column::Available.eq(true))
        .count(db)
        .await
        .map_err(Into::into)
}

async fn to_view(db: &DatabaseConnection, category: category::Model) -> Result<CategoryView> {
    let lesson_count = available_lesson_count(db, category.id).await?;
    Ok(CategoryView {
        id: category.id,
        name: category.name,
        description: category.description,
        icon: category.icon,
        lesson_count,
        created_at: category.created_at,
    })
}

/// Lists all categories ordered by name, each with its available-lesson count.
pub async fn list_categories(db: &DatabaseConnection) -> Result<Vec<CategoryView>> {
    let categories = Category::find()
        .order_by_asc(category::Column::Name)
        .all(db)
        .await?;

    let mut views = Vec::with_capacity(categories.len());
    for category in categories {
        views.push(to_view(db, category).await?);
    }
    Ok(views)
}

/// Fetches a single category with its available-lesson count.
pub async fn get_category(db: &DatabaseConnection, category_id: i64) -> Result<CategoryView> {
    let category = Category::find_by_id(category_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Category".to_string(),
        })?;

    to_view(db, category).await
}

fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.len() < 2 {
        return Err(Error::Validation {
            message: "Category name must be at least 2 characters".to_string(),
        });
    }
    if trimmed.len() > 50 {
        return Err(Error::Validation {
            message: "Category name must be less than 50 characters".to_string(),
        });
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<()> {
    if description.len() > 500 {
        return Err(Error::Validation {
            message: "Description must be less than 500 characters".to_string(),
        });
    }
    Ok(())
}

fn validate_icon(icon: &str) -> Result<()> {
    if icon.len() > 255 {
        return Err(Error::Validation {
            message: "Icon URL must be less than 255 characters".to_string(),
        });
    }
    Ok(())
}

/// Finds a category whose name matches case-insensitively, excluding an id.
async fn find_name_conflict(
    db: &DatabaseConnection,
    name: &str,
    exclude_id: Option<i64>,
) -> Result<Option<category::Model>> {
    let categories = Category::find().all(db).await?;
    Ok(categories.into_iter().find(|c| {
        c.name.eq_ignore_ascii_case(name.trim()) && Some(c.id) != exclude_id
    }))
}

/// Creates a new category. Admin-only; the name must be unique
/// case-insensitively.
pub async fn create_category(
    db: &DatabaseConnection,
    identity: &Identity,
    name: String,
    description: String,
    icon: String,
) -> Result<CategoryView> {
    identity.require_admin()?;

    validate_name(&name)?;
    validate_description(&description)?;
    validate_icon(&icon)?;

    if find_name_conflict(db, &name, None).await?.is_some() {
        return Err(Error::Conflict {
            message: "Category with this name already exists".to_string(),
        });
    }

    let now = chrono::Utc::now();
    let category = category::ActiveModel {
        name: Set(name.trim().to_string()),
        description: Set(description.trim().to_string()),
        icon: Set(icon.trim().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let created = category.insert(db).await?;
    to_view(db, created).await
}

/// Applies a typed partial update to a category. Admin-only.
pub async fn update_category(
    db: &DatabaseConnection,
    identity: &Identity,
    category_id: i64,
    update: CategoryUpdate,
) -> Result<CategoryView> {
    identity.require_admin()?;

    if update.is_empty() {
        return Err(Error::Validation {
            message: "No fields to update".to_string(),
        });
    }

    if let Some(name) = &update.name {
        validate_name(name)?;
        if find_name_conflict(db, name, Some(category_id)).await?.is_some() {
            return Err(Error::Conflict {
                message: "Category with this name already exists".to_string(),
            });
        }
    }
    if let Some(description) = &update.description {
        validate_description(description)?;
    }
    if let Some(icon) = &update.icon {
        validate_icon(icon)?;
    }

    let mut category: category::ActiveModel = Category::find_by_id(category_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Category".to_string(),
        })?
        .into();

    if let Some(name) = update.name {
        category.name = Set(name.trim().to_string());
    }
    if let Some(description) = update.description {
        category.description = Set(description.trim().to_string());
    }
    if let Some(icon) = update.icon {
        category.icon = Set(icon.trim().to_string());
    }
    category.updated_at = Set(chrono::Utc::now());

    let updated = category.update(db).await?;
    to_view(db, updated).await
}

/// Deletes a category. Admin-only; refuses while lessons reference it.
pub async fn delete_category(
    db: &DatabaseConnection,
    identity: &Identity,
    category_id: i64,
) -> Result<()> {
    identity.require_admin()?;

    let category = Category::find_by_id(category_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Category".to_string(),
        })?;

    let lesson_count = Lesson::find()
        .filter(lesson::Column::CategoryId.eq(category.id))
        .count(db)
        .await?;

    if lesson_count > 0 {
        return Err(Error::Conflict {
            message: format!(
                "Cannot delete category. It has {lesson_count} associated lesson(s). Please remove or reassign lessons first."
            ),
        });
    }

    category.delete(db).await?;
    Ok(())
}
