//! Test fixtures for creating job board data.

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use relay_core::domains::job_posts::JobPostRow;
use sqlx::PgPool;

/// Fixed clock for cycle tests: 2025-06-01 12:00:00 UTC
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// `minutes` before [`now`]
pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    now() - Duration::minutes(minutes)
}

/// A valid, published full-time on-site posting.
pub fn job_row(id: &str, title: &str, created_at: DateTime<Utc>) -> JobPostRow {
    JobPostRow {
        id: id.to_string(),
        slug: Some(format!("{}-slug", id)),
        title: title.to_string(),
        company_name: "Acme".to_string(),
        work_location_type: "ONSITE".to_string(),
        employment_type: "FULL_TIME".to_string(),
        experience_years: None,
        is_internship: false,
        category: None,
        country: None,
        city: None,
        apply_url: format!("https://acme.example.com/apply/{}", id),
        description: Some("Build things.".to_string()),
        image_url: None,
        is_published: true,
        created_at,
    }
}

pub fn unpublished_row(id: &str, title: &str, created_at: DateTime<Utc>) -> JobPostRow {
    JobPostRow {
        is_published: false,
        ..job_row(id, title, created_at)
    }
}

/// The remote full-time Backend Engineer posting used across formatter tests.
pub fn backend_engineer_row(created_at: DateTime<Utc>) -> JobPostRow {
    JobPostRow {
        id: "job_backend".to_string(),
        slug: Some("backend-engineer-acme".to_string()),
        title: "Backend Engineer".to_string(),
        company_name: "Acme".to_string(),
        work_location_type: "REMOTE".to_string(),
        employment_type: "FULL_TIME".to_string(),
        experience_years: Some("TWO_PLUS".to_string()),
        is_internship: false,
        category: Some("Engineering".to_string()),
        country: Some("Nigeria".to_string()),
        city: Some("Lagos".to_string()),
        apply_url: "https://x.io/apply".to_string(),
        description: Some("We are hiring a backend engineer to own our APIs.".to_string()),
        image_url: None,
        is_published: true,
        created_at,
    }
}

/// Tables owned by the job board. The relay never creates these in production.
pub const JOB_BOARD_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS job_categories (id TEXT PRIMARY KEY, name TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS countries (id TEXT PRIMARY KEY, name TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS cities (id TEXT PRIMARY KEY, name TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS job_posts (
    id TEXT PRIMARY KEY,
    slug TEXT,
    title TEXT NOT NULL,
    "companyName" TEXT NOT NULL,
    "workLocationType" TEXT NOT NULL,
    "employmentType" TEXT NOT NULL,
    "experienceYears" TEXT,
    "isInternship" BOOLEAN,
    "categoryId" TEXT REFERENCES job_categories(id),
    "countryId" TEXT REFERENCES countries(id),
    "cityId" TEXT REFERENCES cities(id),
    "linkedInApplyURL" TEXT NOT NULL,
    "uniqueDescription" TEXT,
    "jobImageUrl" TEXT,
    "isPublished" BOOLEAN NOT NULL DEFAULT false,
    "createdAt" TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

/// Insert a posting into `job_posts`, creating its category if given.
pub async fn insert_job_post(pool: &PgPool, row: &JobPostRow) -> Result<()> {
    let category_id = match &row.category {
        Some(name) => {
            let id = format!("cat_{}", row.id);
            sqlx::query("INSERT INTO job_categories (id, name) VALUES ($1, $2)")
                .bind(&id)
                .bind(name)
                .execute(pool)
                .await?;
            Some(id)
        }
        None => None,
    };

    sqlx::query(
        r#"INSERT INTO job_posts
           (id, slug, title, "companyName", "workLocationType", "employmentType",
            "experienceYears", "isInternship", "categoryId", "linkedInApplyURL",
            "uniqueDescription", "jobImageUrl", "isPublished", "createdAt")
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, ($14 AT TIME ZONE 'UTC'))"#,
    )
    .bind(&row.id)
    .bind(&row.slug)
    .bind(&row.title)
    .bind(&row.company_name)
    .bind(&row.work_location_type)
    .bind(&row.employment_type)
    .bind(&row.experience_years)
    .bind(row.is_internship)
    .bind(category_id)
    .bind(&row.apply_url)
    .bind(&row.description)
    .bind(&row.image_url)
    .bind(row.is_published)
    .bind(row.created_at)
    .execute(pool)
    .await?;

    Ok(())
}
