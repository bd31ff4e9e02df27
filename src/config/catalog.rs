//! Seed catalog loading from config.toml
//!
//! This module provides functionality to load the initial categories and
//! teachers from a TOML configuration file. The entries defined in
//! config.toml are used to seed the database on first run, so a fresh
//! deployment has something to list before an admin touches it.

use crate::{
    entities::{Category, Teacher, category, teacher},
    errors::{Error, Result},
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct SeedConfig {
    /// Categories to seed on first run
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    /// Teachers to seed on first run
    #[serde(default)]
    pub teachers: Vec<TeacherSeed>,
}

/// Seed definition for a single category
#[derive(Debug, Deserialize, Clone)]
pub struct CategorySeed {
    /// Category name
    pub name: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Icon name or URL
    #[serde(default)]
    pub icon: String,
}

/// Seed definition for a single teacher
#[derive(Debug, Deserialize, Clone)]
pub struct TeacherSeed {
    /// Teacher name
    pub name: String,
    /// Professional title
    pub title: String,
    /// Avatar image URL
    pub avatar: Option<String>,
    /// Short biography
    pub bio: Option<String>,
    /// Certifications and credentials
    pub credentials: Option<String>,
    /// Years of teaching experience
    #[serde(default)]
    pub experience_years: i32,
}

/// Loads the seed catalog from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is invalid,
/// or required fields are missing.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SeedConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the seed catalog from the default location (./config.toml)
pub fn load_default_config() -> Result<SeedConfig> {
    load_config("config.toml")
}

/// Seeds categories and teachers when their tables are empty.
///
/// Seeding is skipped per table once any row exists, so redeploys never
/// duplicate or clobber admin edits.
pub async fn seed_initial_catalog(db: &DatabaseConnection, config: &SeedConfig) -> Result<()> {
    let now = chrono::Utc::now();

    if Category::find().count(db).await? == 0 {
        for seed in &config.categories {
            let model = category::ActiveModel {
                name: Set(seed.name.clone()),
                description: Set(seed.description.clone()),
                icon: Set(seed.icon.clone()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            model.insert(db).await?;
        }
        info!(count = config.categories.len(), "Seeded categories");
    }

    if Teacher::find().count(db).await? == 0 {
        for seed in &config.teachers {
            let model = teacher::ActiveModel {
                user_id: Set(None),
                name: Set(seed.name.clone()),
                title: Set(seed.title.clone()),
                avatar: Set(seed.avatar.clone()),
                bio: Set(seed.bio.clone()),
                credentials: Set(seed.credentials.clone()),
                experience_years: Set(seed.experience_years),
                rating: Set(0.0),
                total_reviews: Set(0),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            model.insert(db).await?;
        }
        info!(count = config.teachers.len(), "Seeded teachers");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_db;

    #[test]
    fn test_parse_seed_config() {
        let toml_str = r#"
            [[categories]]
            name = "Music"
            description = "Instruments and voice"
            icon = "music-note"

            [[categories]]
            name = "Sports"

            [[teachers]]
            name = "Dana Reyes"
            title = "Piano Instructor"
            experience_years = 8
        "#;

        let config: SeedConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.categories[0].name, "Music");
        assert_eq!(config.categories[0].icon, "music-note");
        assert_eq!(config.categories[1].description, "");

        assert_eq!(config.teachers.len(), 1);
        assert_eq!(config.teachers[0].title, "Piano Instructor");
        assert_eq!(config.teachers[0].experience_years, 8);
        assert!(config.teachers[0].avatar.is_none());
    }

    #[tokio::test]
    async fn test_seed_initial_catalog_once() -> Result<()> {
        let db = setup_test_db().await?;

        let config: SeedConfig = toml::from_str(
            r#"
            [[categories]]
            name = "Music"

            [[teachers]]
            name = "Dana Reyes"
            title = "Piano Instructor"
        "#,
        )
        .unwrap();

        seed_initial_catalog(&db, &config).await?;
        assert_eq!(Category::find().count(&db).await?, 1);
        assert_eq!(Teacher::find().count(&db).await?, 1);

        // A second run must not duplicate anything
        seed_initial_catalog(&db, &config).await?;
        assert_eq!(Category::find().count(&db).await?, 1);
        assert_eq!(Teacher::find().count(&db).await?, 1);

        Ok(())
    }
}
