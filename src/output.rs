//! Output file naming.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

/// Filesystem-safe timestamp, e.g. `2025-01-31T12-30-45-123Z`.
pub fn timestamp() -> String {
    format_timestamp(Utc::now())
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// `dir/<prefix>-<timestamp>.<extension>`
pub fn timestamped_path(dir: &Path, prefix: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}-{}.{}", prefix, timestamp(), extension))
}
