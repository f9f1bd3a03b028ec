//! Markdown report rendering.

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

/// Wrap a review in the report header.
pub fn render_markdown(topic: &str, review: &str, generated: DateTime<Utc>) -> String {
    format!(
        "# Literature Review\n\n**Topic:** {}\n\n**Generated:** {}\n\n---\n\n{}\n",
        topic,
        generated.to_rfc3339_opts(SecondsFormat::Secs, true),
        review.trim_end()
    )
}

/// Render the report and write it to `path`, creating parent directories.
pub fn write_report(path: &Path, topic: &str, review: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_markdown(topic, review, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_header() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let doc = render_markdown("qec", "## Intro\nBody\n\n", at);
        assert_eq!(
            doc,
            "# Literature Review\n\n**Topic:** qec\n\n**Generated:** 2025-03-01T12:30:00Z\n\n---\n\n## Intro\nBody\n"
        );
    }

    #[test]
    fn test_write_report_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/review.md");
        write_report(&path, "qec", "Body").unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Literature Review\n\n**Topic:** qec"));
        assert!(written.ends_with("Body\n"));
    }
}
