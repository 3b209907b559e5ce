//! Entity types and the 13-dimension epistemic vector model.

pub mod entities;
pub mod types;
pub mod vectors;

/// Current wall-clock time as fractional Unix seconds (millisecond precision).
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Generate a new random record ID. Its first 8 characters are printed as a
/// short handle, so they must not share a time prefix.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
