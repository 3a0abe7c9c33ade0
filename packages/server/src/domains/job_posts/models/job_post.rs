use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use thiserror::Error;

// The job board owns `job_posts` (Prisma naming, quoted camelCase columns).
// This service only ever reads it.
const SELECT_JOB_POSTS: &str = r#"
    SELECT jp.id,
           jp.slug,
           jp.title,
           jp."companyName" AS company_name,
           jp."workLocationType"::text AS work_location_type,
           jp."employmentType"::text AS employment_type,
           jp."experienceYears"::text AS experience_years,
           COALESCE(jp."isInternship", false) AS is_internship,
           cat.name AS category,
           co.name AS country,
           ci.name AS city,
           jp."linkedInApplyURL" AS apply_url,
           jp."uniqueDescription" AS description,
           jp."jobImageUrl" AS image_url,
           jp."isPublished" AS is_published,
           (jp."createdAt" AT TIME ZONE 'UTC') AS created_at
    FROM job_posts jp
    LEFT JOIN job_categories cat ON cat.id = jp."categoryId"
    LEFT JOIN countries co ON co.id = jp."countryId"
    LEFT JOIN cities ci ON ci.id = jp."cityId"
"#;

/// Validation failures when turning a stored row into a [`JobRecord`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("job {job_id}: required field `{field}` is empty")]
    MissingField { job_id: String, field: &'static str },

    #[error("job {job_id}: unknown {field} value `{value}`")]
    UnknownValue {
        job_id: String,
        field: &'static str,
        value: String,
    },

    #[error("job {job_id}: apply URL `{url}` is not a valid http(s) URL")]
    InvalidUrl { job_id: String, url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkLocationType {
    Onsite,
    Remote,
    Hybrid,
}

impl WorkLocationType {
    pub fn label(&self) -> &'static str {
        match self {
            WorkLocationType::Onsite => "On-site",
            WorkLocationType::Remote => "Remote",
            WorkLocationType::Hybrid => "Hybrid",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "ONSITE" => Some(WorkLocationType::Onsite),
            "REMOTE" => Some(WorkLocationType::Remote),
            "HYBRID" => Some(WorkLocationType::Hybrid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
}

impl EmploymentType {
    pub fn label(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "Full Time",
            EmploymentType::PartTime => "Part Time",
            EmploymentType::Contract => "Contract",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "FULL_TIME" => Some(EmploymentType::FullTime),
            "PART_TIME" => Some(EmploymentType::PartTime),
            "CONTRACT" => Some(EmploymentType::Contract),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperienceYears {
    OnePlus,
    TwoPlus,
    FivePlus,
}

impl ExperienceYears {
    pub fn label(&self) -> &'static str {
        match self {
            ExperienceYears::OnePlus => "1+ years",
            ExperienceYears::TwoPlus => "2+ years",
            ExperienceYears::FivePlus => "5+ years",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "ONE_PLUS" => Some(ExperienceYears::OnePlus),
            "TWO_PLUS" => Some(ExperienceYears::TwoPlus),
            "FIVE_PLUS" => Some(ExperienceYears::FivePlus),
            _ => None,
        }
    }
}

/// A `job_posts` row as stored, with enum columns still as text.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPostRow {
    pub id: String,
    pub slug: Option<String>,
    pub title: String,
    pub company_name: String,
    pub work_location_type: String,
    pub employment_type: String,
    pub experience_years: Option<String>,
    pub is_internship: bool,
    pub category: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub apply_url: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// Validated, read-only view of a job posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub slug: Option<String>,
    pub title: String,
    pub company_name: String,
    pub work_location_type: WorkLocationType,
    pub employment_type: EmploymentType,
    pub experience_years: Option<ExperienceYears>,
    pub is_internship: bool,
    pub category: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub apply_url: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// Blank optional strings are treated as absent so they never render as empty lines.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(job_id: &str, field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField {
            job_id: job_id.to_string(),
            field,
        });
    }
    Ok(trimmed.to_string())
}

impl TryFrom<JobPostRow> for JobRecord {
    type Error = ValidationError;

    fn try_from(row: JobPostRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let unknown = |field: &'static str, value: &str| ValidationError::UnknownValue {
            job_id: id.clone(),
            field,
            value: value.to_string(),
        };

        let title = required(&id, "title", row.title)?;
        let company_name = required(&id, "companyName", row.company_name)?;

        let work_location_type = WorkLocationType::parse(&row.work_location_type)
            .ok_or_else(|| unknown("workLocationType", &row.work_location_type))?;
        let employment_type = EmploymentType::parse(&row.employment_type)
            .ok_or_else(|| unknown("employmentType", &row.employment_type))?;
        let experience_years = match non_blank(row.experience_years) {
            Some(value) => Some(
                ExperienceYears::parse(&value).ok_or_else(|| unknown("experienceYears", &value))?,
            ),
            None => None,
        };

        let apply_url = required(&id, "applyURL", row.apply_url)?;
        match url::Url::parse(&apply_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {}
            _ => {
                return Err(ValidationError::InvalidUrl {
                    job_id: id,
                    url: apply_url,
                })
            }
        }

        Ok(JobRecord {
            id,
            slug: non_blank(row.slug),
            title,
            company_name,
            work_location_type,
            employment_type,
            experience_years,
            is_internship: row.is_internship,
            category: non_blank(row.category),
            country: non_blank(row.country),
            city: non_blank(row.city),
            apply_url,
            description: non_blank(row.description),
            image_url: non_blank(row.image_url),
            is_published: row.is_published,
            created_at: row.created_at,
        })
    }
}

impl JobPostRow {
    /// Published rows created at or after `since`, oldest first.
    pub async fn find_published_since(since: DateTime<Utc>, pool: &PgPool) -> Result<Vec<Self>> {
        let sql = format!(
            r#"{SELECT_JOB_POSTS}
               WHERE jp."isPublished" = true
                 AND jp."createdAt" >= ($1 AT TIME ZONE 'UTC')
               ORDER BY jp."createdAt" ASC, jp.id ASC"#
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(since)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_ids(ids: &[String], pool: &PgPool) -> Result<Vec<Self>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"{SELECT_JOB_POSTS}
               WHERE jp.id = ANY($1)
               ORDER BY jp."createdAt" ASC, jp.id ASC"#
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(ids)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_id(id: &str, pool: &PgPool) -> Result<Option<Self>> {
        let sql = format!("{SELECT_JOB_POSTS} WHERE jp.id = $1");
        sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }
}
