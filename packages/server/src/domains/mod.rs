// Business domains
pub mod distribution;
pub mod job_posts;
