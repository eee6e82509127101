//! ID generation utilities.

use chrono::Utc;
use ulid::Ulid;
use uuid::Uuid;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based primary key.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a cryptographically secure random bearer token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        // UUID v4 has no time component
        Uuid::new_v4().simple().to_string()
    }

    /// Generate a human-readable report number, e.g. `RPT482913417`.
    ///
    /// Six digits of the current millisecond clock followed by a random
    /// number below 1000. Uniqueness is enforced by the database index.
    #[must_use]
    pub fn generate_report_number(&self) -> String {
        let millis = Utc::now().timestamp_millis().rem_euclid(1_000_000);
        format!("RPT{millis:06}{}", random_below_1000())
    }

    /// Generate a staff identifier, e.g. `STAFF1718000000000123`.
    #[must_use]
    pub fn generate_staff_id(&self) -> String {
        format!(
            "STAFF{}{:03}",
            Utc::now().timestamp_millis(),
            random_below_1000()
        )
    }

    /// Generate a file name for a stored photo.
    #[must_use]
    pub fn generate_file_name(&self, extension: &str) -> String {
        format!("{}.{extension}", Uuid::new_v4())
    }
}

fn random_below_1000() -> u128 {
    Uuid::new_v4().as_u128() % 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_generate_token() {
        let token = IdGenerator::new().generate_token();
        assert_eq!(token.len(), 32);
    }

    #[test]
    fn test_report_number_shape() {
        let number = IdGenerator::new().generate_report_number();
        assert!(number.starts_with("RPT"));
        let digits = &number[3..];
        assert!((7..=9).contains(&digits.len()));
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_staff_id_shape() {
        let staff_id = IdGenerator::new().generate_staff_id();
        assert!(staff_id.starts_with("STAFF"));
        assert!(staff_id[5..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_file_name_extension() {
        let name = IdGenerator::new().generate_file_name("webp");
        assert!(name.ends_with(".webp"));
        assert_eq!(name.len(), 36 + 5);
    }
}
