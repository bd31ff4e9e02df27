//! Catalog business logic - lesson listing, detail, and featured selection.
//!
//! Listing filters are combined server-side into one query; category and
//! teacher attributes are joined onto each lesson so the host layer can
//! render a row without further lookups. An unknown category name yields an
//! empty page rather than an error.

use crate::{
    core::pagination::{Page, Pagination},
    entities::{Category, Lesson, PriceUnit, Review, Teacher, User, category, lesson, review, teacher},
    errors::{Error, Result},
};
use sea_orm::{Condition, Order, PaginatorTrait, QueryOrder, QuerySelect, prelude::*};
use std::collections::HashMap;

/// Filter criteria for the lesson listing. Unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct LessonFilter {
    /// Category **name**; an unknown name yields an empty page
    pub category: Option<String>,
    /// Only featured (or only non-featured) lessons
    pub featured: Option<bool>,
    /// Only available (or only unavailable) lessons
    pub available: Option<bool>,
    /// Case-insensitive substring over title, description, or teacher name
    pub search: Option<String>,
    /// Lower price bound, inclusive
    pub min_price: Option<f64>,
    /// Upper price bound, inclusive
    pub max_price: Option<f64>,
    /// Substring match over the age-group label
    pub age_group: Option<String>,
}

/// A lesson row denormalized with its category and teacher attributes.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LessonView {
    /// Lesson id
    pub id: i64,
    /// Lesson title
    pub title: String,
    /// Category id
    pub category_id: i64,
    /// Joined category name
    pub category_name: Option<String>,
    /// Joined category icon
    pub category_icon: Option<String>,
    /// Teacher id
    pub teacher_id: i64,
    /// Joined teacher name
    pub teacher_name: Option<String>,
    /// Joined teacher title
    pub teacher_title: Option<String>,
    /// Joined teacher avatar
    pub teacher_avatar: Option<String>,
    /// Joined teacher rating
    pub teacher_rating: Option<f64>,
    /// Price per unit in dollars
    pub price: f64,
    /// Unit the price is quoted in
    pub price_unit: PriceUnit,
    /// Mean review rating
    pub rating: f64,
    /// Review count
    pub review_count: i32,
    /// Human-readable duration
    pub duration: String,
    /// Human-readable schedule
    pub schedule: String,
    /// Target age range
    pub age_group: String,
    /// Seats currently committed
    pub students_enrolled: i32,
    /// Seat capacity
    pub max_students: i32,
    /// Full description
    pub description: String,
    /// Cover image URL
    pub image: Option<String>,
    /// Ordered list of selling points
    pub features: Vec<String>,
    /// Landing-page promotion flag
    pub featured: bool,
    /// Availability flag
    pub available: bool,
    /// When the lesson was created
    pub created_at: DateTimeUtc,
}

impl LessonView {
    fn build(
        lesson: lesson::Model,
        category: Option<&category::Model>,
        teacher: Option<&teacher::Model>,
    ) -> Self {
        Self {
            id: lesson.id,
            title: lesson.title,
            category_id: lesson.category_id,
            category_name: category.map(|c| c.name.clone()),
            category_icon: category.map(|c| c.icon.clone()),
            teacher_id: lesson.teacher_id,
            teacher_name: teacher.map(|t| t.name.clone()),
            teacher_title: teacher.map(|t| t.title.clone()),
            teacher_avatar: teacher.and_then(|t| t.avatar.clone()),
            teacher_rating: teacher.map(|t| t.rating),
            price: lesson.price,
            price_unit: lesson.price_unit,
            rating: lesson.rating,
            review_count: lesson.review_count,
            duration: lesson.duration,
            schedule: lesson.schedule,
            age_group: lesson.age_group,
            students_enrolled: lesson.students_enrolled,
            max_students: lesson.max_students,
            description: lesson.description,
            image: lesson.image,
            features: lesson.features.0,
            featured: lesson.featured,
            available: lesson.available,
            created_at: lesson.created_at,
        }
    }
}

/// A review joined with its reviewer's name.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReviewView {
    /// Review id
    pub id: i64,
    /// Reviewing user id
    pub user_id: i64,
    /// Reviewer display name
    pub user_name: Option<String>,
    /// Star rating, 1 to 5
    pub rating: i32,
    /// Review comment
    pub comment: Option<String>,
    /// When the review was created
    pub created_at: DateTimeUtc,
}

/// Full detail-page payload for one lesson.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LessonDetail {
    /// The lesson itself
    pub lesson: LessonView,
    /// Joined category description
    pub category_description: Option<String>,
    /// Joined teacher biography
    pub teacher_bio: Option<String>,
    /// Joined teacher credentials
    pub teacher_credentials: Option<String>,
    /// Joined teacher years of experience
    pub teacher_experience: Option<i32>,
    /// Joined teacher review total
    pub teacher_total_reviews: Option<i32>,
    /// Up to 4 available lessons from the same category, best-rated first
    pub similar_lessons: Vec<LessonView>,
    /// Up to 10 most recent reviews with reviewer names
    pub reviews: Vec<ReviewView>,
}

/// Fetches the categories and teachers referenced by a batch of lessons.
async fn load_lesson_refs(
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

fn build_views(
    lessons: Vec<lesson::Model>,
    categories: &HashMap<i64, category::Model>,
    teachers: &HashMap<i64, teacher::Model>,
) -> Vec<LessonView> {
    lessons
        .into_iter()
        .map(|l| {
            let category = categories.get(&l.category_id);
            let teacher = teachers.get(&l.teacher_id);
            LessonView::build(l, category, teacher)
        })
        .collect()
}

/// Resolves the requested sort against the allow-list.
///
/// Unrecognized fields fall back to creation time; the order is descending
/// unless "asc" was asked for explicitly.
fn resolve_sort(sort_by: Option<&str>, sort_order: Option<&str>) -> (lesson::Column, Order) {
    let column = match sort_by {
        Some("price") => lesson::Column::Price,
        Some("rating") => lesson::Column::Rating,
        Some("title") => lesson::Column::Title,
        Some("students_enrolled") => lesson::Column::StudentsEnrolled,
        _ => lesson::Column::CreatedAt,
    };
    let order = match sort_order {
        Some(o) if o.eq_ignore_ascii_case("asc") => Order::Asc,
        _ => Order::Desc,
    };
    (column, order)
}

/// Lists lessons with filtering, sorting, and pagination.
pub async fn list_lessons(
    db: &DatabaseConnection,
    filter: &LessonFilter,
    sort_by: Option<&str>,
    sort_order: Option<&str>,
    page: u64,
    page_size: u64,
) -> Result<Page<LessonView>> {
    let mut query = Lesson::find();

    if let Some(name) = &filter.category {
        let Some(category) = Category::find()
            .filter(category::Column::Name.eq(name.clone()))
            .one(db)
            .await?
        else {
            // Unknown category name yields an empty result page, not an error
            return Ok(Page::empty(page, page_size));
        };
        query = query.filter(lesson::Column::CategoryId.eq(category.id));
    }

    if let Some(featured) = filter.featured {
        query = query.filter(lesson::Column::Featured.eq(featured));
    }
    if let Some(available) = filter.available {
        query = query.filter(lesson::Column::Available.eq(available));
    }
    if let Some(min_price) = filter.min_price {
        query = query.filter(lesson::Column::Price.gte(min_price));
    }
    if let Some(max_price) = filter.max_price {
        query = query.filter(lesson::Column::Price.lte(max_price));
    }
    if let Some(age_group) = &filter.age_group {
        query = query.filter(lesson::Column::AgeGroup.contains(age_group));
    }

    if let Some(search) = &filter.search {
        let teacher_ids: Vec<i64> = Teacher::find()
            .filter(teacher::Column::Name.contains(search))
            .all(db)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();

        query = query.filter(
            Condition::any()
                .add(lesson::Column::Title.contains(search))
                .add(lesson::Column::Description.contains(search))
                .add(lesson::Column::TeacherId.is_in(teacher_ids)),
        );
    }

    let total = query.clone().count(db).await?;
    let pagination = Pagination::new(page, page_size, total);

    let (sort_column, order) = resolve_sort(sort_by, sort_order);
    let lessons = query
        .order_by(sort_column, order)
        .offset(pagination.offset())
        .limit(pagination.items_per_page)
        .all(db)
        .await?;

    let (categories, teachers) = load_lesson_refs(db, &lessons).await?;
    Ok(Page {
        items: build_views(lessons, &categories, &teachers),
        pagination,
    })
}

/// Fetches one lesson with similar lessons and recent reviews.
pub async fn get_lesson_detail(db: &DatabaseConnection, lesson_id: i64) -> Result<LessonDetail> {
    let lesson = Lesson::find_by_id(lesson_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "Lesson".to_string(),
        })?;

    let category = Category::find_by_id(lesson.category_id).one(db).await?;
    let teacher = Teacher::find_by_id(lesson.teacher_id).one(db).await?;

    let similar = Lesson::find()
        .filter(lesson::Column::CategoryId.eq(lesson.category_id))
        .filter(lesson::Column::Id.ne(lesson.id))
        .filter(lesson::Column::Available.eq(true))
        .order_by_desc(lesson::Column::Rating)
        .limit(4)
        .all(db)
        .await?;
    let (similar_categories, similar_teachers) = load_lesson_refs(db, &similar).await?;

    let reviews = Review::find()
        .filter(review::Column::LessonId.eq(lesson.id))
        .order_by_desc(review::Column::CreatedAt)
        .limit(10)
        .find_also_related(User)
        .all(db)
        .await?
        .into_iter()
        .map(|(r, user)| ReviewView {
            id: r.id,
            user_id: r.user_id,
            user_name: user.map(|u| u.name),
            rating: r.rating,
            comment: r.comment,
            created_at: r.created_at,
        })
        .collect();

    Ok(LessonDetail {
        lesson: LessonView::build(lesson, category.as_ref(), teacher.as_ref()),
        category_description: category.map(|c| c.description),
        teacher_bio: teacher.as_ref().and_then(|t| t.bio.clone()),
        teacher_credentials: teacher.as_ref().and_then(|t| t.credentials.clone()),
        teacher_experience: teacher.as_ref().map(|t| t.experience_years),
        teacher_total_reviews: teacher.as_ref().map(|t| t.total_reviews),
        similar_lessons: build_views(similar, &similar_categories, &similar_teachers),
        reviews,
    })
}

/// Lists featured, available lessons, best-rated first.
pub async fn list_featured(db: &DatabaseConnection, limit: u64) -> Result<Vec<LessonView>> {
    let lessons = Lesson::find()
        .filter(lesson::Column::Featured.eq(true))
        .filter(lesson::Column::Available.eq(true))
        .order_by_desc(lesson::Column::Rating)
        .order_by_desc(lesson::Column::StudentsEnrolled)
        .limit(limit)
        .all(db)
        .await?;

    let (categories, teachers) = load_lesson_refs(db, &lessons).await?;
    Ok(build_views(lessons, &categories, &teachers))
}
