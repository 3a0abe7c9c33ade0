//! Job posts domain - read-only view of the job board's postings

pub mod models;

pub use models::{
    EmploymentType, ExperienceYears, JobPostRow, JobRecord, ValidationError, WorkLocationType,
};
