//! Rendering tests for each destination.

mod common;

use crate::common::{backend_engineer_row, job_row, now};
use relay_core::domains::distribution::formatter::{truncate_description, DESCRIPTION_BUDGET};
use relay_core::domains::distribution::{Destination, MessageFormatter};
use relay_core::domains::job_posts::{JobPostRow, JobRecord};

fn record(row: JobPostRow) -> JobRecord {
    JobRecord::try_from(row).expect("fixture row is valid")
}

fn formatter() -> MessageFormatter {
    MessageFormatter::new(None, None)
}

// =============================================================================
// Backend Engineer scenario
// =============================================================================

/// Backend Engineer at Acme with every optional field absent.
fn bare_backend_engineer() -> JobRecord {
    record(JobPostRow {
        slug: None,
        work_location_type: "REMOTE".to_string(),
        description: None,
        apply_url: "https://x/1".to_string(),
        ..job_row("job_bare", "Backend Engineer", now())
    })
}

#[test]
fn telegram_bare_backend_engineer_message_is_exact() {
    let text = formatter().format(&bare_backend_engineer(), Destination::Telegram);

    assert_eq!(
        text,
        "📌 *Backend Engineer*\n\
         🏢 _Acme_\n\
         💼 Full Time \\| Remote\n\
         \n\
         👉 [Apply Now](https://x/1)"
    );
}

#[test]
fn whatsapp_bare_backend_engineer_message_is_exact() {
    let text = formatter().format(&bare_backend_engineer(), Destination::WhatsApp);

    assert_eq!(
        text,
        "📌 Backend Engineer\n\
         🏢 Acme\n\
         💼 Full Time | Remote\n\
         \n\
         👉 Apply: https://x/1"
    );
}

#[test]
fn telegram_backend_engineer_message() {
    let job = record(backend_engineer_row(now()));
    let text = formatter().format(&job, Destination::Telegram);

    assert!(text.starts_with("📌 *Backend Engineer*\n🏢 _Acme_\n"));
    assert!(text.contains("📍 Lagos, Nigeria"));
    assert!(text.contains("💼 Full Time \\| Remote"));
    assert!(text.contains("🏷️ Engineering"));
    assert!(text.contains("📊 Experience: 2\\+ years"));
    assert!(text.ends_with("👉 [Apply Now](https://x.io/apply)"));
    assert!(!text.contains("Internship"));
}

#[test]
fn whatsapp_backend_engineer_message_is_plain_text() {
    let job = record(backend_engineer_row(now()));
    let text = formatter().format(&job, Destination::WhatsApp);

    assert_eq!(
        text,
        "📌 Backend Engineer\n\
         🏢 Acme\n\
         📍 Lagos, Nigeria\n\
         💼 Full Time | Remote\n\
         🏷️ Engineering\n\
         📊 Experience: 2+ years\n\
         \n\
         👉 Apply: https://x.io/apply"
    );
}

#[test]
fn facebook_backend_engineer_message_has_description_and_hashtags() {
    let job = record(backend_engineer_row(now()));
    let text = formatter().format(&job, Destination::Facebook);

    assert!(text.contains("We are hiring a backend engineer to own our APIs."));
    assert!(text.contains("👉 Apply: https://x.io/apply"));
    assert!(text.ends_with("#Jobs #Engineering #Hiring #RemoteJobs"));
}

#[test]
fn site_url_replaces_apply_url_when_slug_known() {
    let job = record(backend_engineer_row(now()));
    let formatter = MessageFormatter::new(Some("https://jobs.example.com/".into()), None);

    assert_eq!(
        formatter.apply_link(&job),
        "https://jobs.example.com/jobs/backend-engineer-acme"
    );
}

// =============================================================================
// Description handling
// =============================================================================

#[test]
fn telegram_never_contains_the_description() {
    let mut row = backend_engineer_row(now());
    row.description = Some("UNIQUE-DESCRIPTION-MARKER ".repeat(40));
    let job = record(row);

    let telegram = formatter().format(&job, Destination::Telegram);
    let whatsapp = formatter().format(&job, Destination::WhatsApp);

    assert!(!telegram.contains("UNIQUE"));
    assert!(!whatsapp.contains("UNIQUE"));
}

#[test]
fn facebook_description_is_cut_to_budget() {
    let mut row = backend_engineer_row(now());
    let long = "a".repeat(500);
    row.description = Some(long.clone());
    let job = record(row);

    let text = formatter().format(&job, Destination::Facebook);

    assert!(!text.contains(&long));
    let preview = text
        .lines()
        .find(|line| line.starts_with('a'))
        .expect("description line present");
    assert_eq!(preview.chars().count(), DESCRIPTION_BUDGET);
    assert!(preview.ends_with("..."));
}

#[test]
fn truncation_is_idempotent() {
    let inputs = [
        String::new(),
        "short".to_string(),
        "x".repeat(DESCRIPTION_BUDGET),
        "word ".repeat(120),
        "ü".repeat(350),
    ];
    for input in inputs {
        let once = truncate_description(&input);
        assert_eq!(truncate_description(&once), once);
        assert!(once.chars().count() <= DESCRIPTION_BUDGET);
    }
}

// =============================================================================
// Escaping
// =============================================================================

#[test]
fn adversarial_title_is_escaped_for_telegram() {
    let row = JobPostRow {
        company_name: "[Evil](http://phish.example) Corp_*".to_string(),
        ..job_row("job_evil", "*bold* _it_ `code` ~strike~ ||spoiler|| #1!", now())
    };
    let text = formatter().format(&record(row), Destination::Telegram);

    assert!(text.contains(
        "📌 *\\*bold\\* \\_it\\_ \\`code\\` \\~strike\\~ \\|\\|spoiler\\|\\| \\#1\\!*"
    ));
    assert!(text.contains("🏢 _\\[Evil\\]\\(http://phish\\.example\\) Corp\\_\\*_"));
}

#[test]
fn plain_destinations_keep_text_verbatim() {
    let row = job_row("job_plain", "C++ Dev (Senior) - 100% remote!", now());
    let text = formatter().format(&record(row), Destination::WhatsApp);
    assert!(text.starts_with("📌 C++ Dev (Senior) - 100% remote!"));
}

// =============================================================================
// Optional fields
// =============================================================================

#[test]
fn absent_optional_fields_render_no_lines() {
    let row = JobPostRow {
        description: None,
        ..job_row("job_bare", "Cashier", now())
    };
    let job = record(row);

    for destination in Destination::ALL {
        let text = formatter().format(&job, destination);
        assert!(!text.contains("📍"), "{destination}: {text}");
        assert!(!text.contains("🏷️"), "{destination}: {text}");
        assert!(!text.contains("📊"), "{destination}: {text}");
        assert!(!text.contains("\n\n\n"), "{destination}: {text}");
    }
}

#[test]
fn internship_flag_renders() {
    let row = JobPostRow {
        is_internship: true,
        ..job_row("job_intern", "Design Intern", now())
    };
    let job = record(row);

    assert!(formatter()
        .format(&job, Destination::Telegram)
        .contains("🎓 *Internship*"));
    assert!(formatter()
        .format(&job, Destination::WhatsApp)
        .contains("🎓 Internship"));
}

#[test]
fn relative_image_resolves_against_media_base() {
    let row = JobPostRow {
        image_url: Some("/uploads/acme.png".to_string()),
        ..job_row("job_img", "Designer", now())
    };
    let job = record(row);

    let with_base = MessageFormatter::new(None, Some("https://cdn.example.com/".into()));
    assert_eq!(
        with_base.media_url(&job).as_deref(),
        Some("https://cdn.example.com/uploads/acme.png")
    );
    assert_eq!(formatter().media_url(&job), None);
}
