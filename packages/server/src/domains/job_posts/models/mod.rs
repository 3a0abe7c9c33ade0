pub mod job_post;

pub use job_post::*;
