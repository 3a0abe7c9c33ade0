//! Message rendering per destination.
//!
//! Rendering is pure: the same job and destination always produce the same
//! text. Optional fields render as whole lines or not at all.
//!
//! | Destination | Markup | Description | Hashtags |
//! |-------------|--------|-------------|----------|
//! | Telegram    | MarkdownV2 (escaped) | never | no |
//! | WhatsApp    | plain text | never | no |
//! | Facebook    | plain text | truncated preview | yes |

use super::Destination;
use crate::domains::job_posts::{JobRecord, WorkLocationType};

/// Total character budget for a description preview, ellipsis included.
pub const DESCRIPTION_BUDGET: usize = 200;

const ELLIPSIS: &str = "...";

/// Characters Telegram MarkdownV2 treats as markup outside of code entities.
const MARKDOWN_V2_SPECIAL: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.',
    '!',
];

/// Escape user-supplied text for interpolation into a MarkdownV2 message.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escape the target of an inline link; only `)` and `\` are special there.
pub fn escape_link_target(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len());
    for c in url.chars() {
        if c == ')' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Cut `text` to [`DESCRIPTION_BUDGET`] characters including the ellipsis.
///
/// Text already within budget is returned unchanged, so truncating a truncated
/// preview is a no-op.
pub fn truncate_description(text: &str) -> String {
    if text.chars().count() <= DESCRIPTION_BUDGET {
        return text.to_string();
    }
    let keep = DESCRIPTION_BUDGET - ELLIPSIS.len();
    let prefix: String = text.chars().take(keep).collect();
    format!("{}{}", prefix.trim_end(), ELLIPSIS)
}

fn category_hashtag(category: &str) -> Option<String> {
    let tag: String = category
        .replace('&', "And")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    (!tag.is_empty()).then(|| format!("#{}", tag))
}

/// Renders job postings for each destination.
#[derive(Debug, Clone, Default)]
pub struct MessageFormatter {
    site_url: Option<String>,
    media_base_url: Option<String>,
}

impl MessageFormatter {
    pub fn new(site_url: Option<String>, media_base_url: Option<String>) -> Self {
        Self {
            site_url: site_url.map(|u| u.trim_end_matches('/').to_string()),
            media_base_url: media_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// Public job page when the board's URL is known, otherwise the stored apply URL.
    pub fn apply_link(&self, job: &JobRecord) -> String {
        match (&self.site_url, &job.slug) {
            (Some(site), Some(slug)) => format!("{}/jobs/{}", site, slug),
            _ => job.apply_url.clone(),
        }
    }

    /// Absolute image URL for the posting, if any.
    ///
    /// Relative image paths are resolved against the media base URL and dropped
    /// when none is configured.
    pub fn media_url(&self, job: &JobRecord) -> Option<String> {
        let image = job.image_url.as_deref()?;
        if image.starts_with("http://") || image.starts_with("https://") {
            return Some(image.to_string());
        }
        self.media_base_url
            .as_ref()
            .map(|base| format!("{}/{}", base, image.trim_start_matches('/')))
    }

    pub fn format(&self, job: &JobRecord, destination: Destination) -> String {
        match destination {
            Destination::Telegram => self.format_telegram(job),
            Destination::WhatsApp => self.format_plain(job),
            Destination::Facebook => self.format_facebook(job),
        }
    }

    fn format_telegram(&self, job: &JobRecord) -> String {
        let mut lines = vec![
            format!("📌 *{}*", escape_markdown_v2(&job.title)),
            format!("🏢 _{}_", escape_markdown_v2(&job.company_name)),
        ];
        if let Some(location) = location(job) {
            lines.push(format!("📍 {}", escape_markdown_v2(&location)));
        }
        lines.push(format!(
            "💼 {} \\| {}",
            escape_markdown_v2(job.employment_type.label()),
            escape_markdown_v2(job.work_location_type.label())
        ));
        if let Some(category) = &job.category {
            lines.push(format!("🏷️ {}", escape_markdown_v2(category)));
        }
        if let Some(experience) = job.experience_years {
            lines.push(format!(
                "📊 Experience: {}",
                escape_markdown_v2(experience.label())
            ));
        }
        if job.is_internship {
            lines.push("🎓 *Internship*".to_string());
        }
        lines.push(String::new());
        lines.push(format!(
            "👉 [Apply Now]({})",
            escape_link_target(&self.apply_link(job))
        ));
        lines.join("\n")
    }

    fn summary_lines(&self, job: &JobRecord) -> Vec<String> {
        let mut lines = vec![
            format!("📌 {}", job.title),
            format!("🏢 {}", job.company_name),
        ];
        if let Some(location) = location(job) {
            lines.push(format!("📍 {}", location));
        }
        lines.push(format!(
            "💼 {} | {}",
            job.employment_type.label(),
            job.work_location_type.label()
        ));
        if let Some(category) = &job.category {
            lines.push(format!("🏷️ {}", category));
        }
        if let Some(experience) = job.experience_years {
            lines.push(format!("📊 Experience: {}", experience.label()));
        }
        if job.is_internship {
            lines.push("🎓 Internship".to_string());
        }
        lines
    }

    fn format_plain(&self, job: &JobRecord) -> String {
        let mut lines = self.summary_lines(job);
        lines.push(String::new());
        lines.push(format!("👉 Apply: {}", self.apply_link(job)));
        lines.join("\n")
    }

    fn format_facebook(&self, job: &JobRecord) -> String {
        let mut lines = self.summary_lines(job);
        if let Some(description) = &job.description {
            lines.push(String::new());
            lines.push(truncate_description(description));
        }
        lines.push(String::new());
        lines.push(format!("👉 Apply: {}", self.apply_link(job)));

        let mut tags = vec!["#Jobs".to_string()];
        if let Some(tag) = job.category.as_deref().and_then(category_hashtag) {
            tags.push(tag);
        }
        tags.push("#Hiring".to_string());
        if job.work_location_type == WorkLocationType::Remote {
            tags.push("#RemoteJobs".to_string());
        }
        lines.push(String::new());
        lines.push(tags.join(" "));
        lines.join("\n")
    }
}

fn location(job: &JobRecord) -> Option<String> {
    let parts: Vec<&str> = [job.city.as_deref(), job.country.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}
