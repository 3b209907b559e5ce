//! `doctor`: database diagnostics.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::Serialize;

use super::Output;
use crate::config::NoeticConfig;
use crate::db::{self, HealthReport};

#[derive(Serialize)]
struct DoctorResponse {
    status: &'static str,
    database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    health: Option<HealthReport>,
}

/// Inspect the configured database without creating it.
pub fn doctor(config: &NoeticConfig) -> Result<Output> {
    let db_path = config.resolved_db_path();
    let database = db_path.display().to_string();

    if !db_path.exists() {
        let text = format!(
            "Database: not found at {database}\nRun `noetic start \"<objective>\"` to initialize.\n"
        );
        return Output::new(
            &DoctorResponse {
                status: "missing",
                database,
                file_size_bytes: None,
                health: None,
            },
            text,
        );
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    let mut text = String::new();
    writeln!(text, "Noetic Health Report")?;
    writeln!(text, "====================\n")?;
    writeln!(text, "Database:          {database}")?;
    writeln!(text, "File size:         {}", format_bytes(file_size))?;
    writeln!(text, "Schema version:    {}\n", report.schema_version)?;
    writeln!(text, "Row counts:")?;
    writeln!(text, "  Projects:        {}", report.project_count)?;
    writeln!(text, "  Sessions:        {}", report.session_count)?;
    writeln!(text, "  Findings:        {}", report.finding_count)?;
    writeln!(text, "  Unknowns:        {}", report.unknown_count)?;
    writeln!(text, "  Dead ends:       {}", report.dead_end_count)?;
    writeln!(text, "  Mistakes:        {}\n", report.mistake_count)?;
    if report.integrity_ok {
        writeln!(text, "Integrity check:   PASSED")?;
    } else {
        writeln!(text, "Integrity check:   FAILED ({})", report.integrity_details)?;
        writeln!(text, "\nRestore from a backup copy of {database}.")?;
    }

    Output::new(
        &DoctorResponse {
            status: if report.integrity_ok { "ok" } else { "corrupt" },
            database,
            file_size_bytes: Some(file_size),
            health: Some(report),
        },
        text,
    )
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn missing_database_is_reported_not_created() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = NoeticConfig::default();
        config.storage.db_path = dir.path().join("absent.db").display().to_string();

        let out = doctor(&config).unwrap();
        assert_eq!(out.status(), Some("missing"));
        assert!(!dir.path().join("absent.db").exists());
    }

    #[test]
    fn existing_database_reports_health() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("n.db");
        db::open_database(&path).unwrap();
        let mut config = NoeticConfig::default();
        config.storage.db_path = path.display().to_string();

        let out = doctor(&config).unwrap();
        assert_eq!(out.status(), Some("ok"));
        assert_eq!(out.json["health"]["finding_count"], 0);
    }
}
