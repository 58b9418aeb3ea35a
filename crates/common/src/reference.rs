//! Human-facing reference numbers (order numbers, payment references, ...).

use chrono::Utc;
use uuid::Uuid;

/// Generates `PREFIX-<unix millis>-<HEX>` where `HEX` is `random_len` uppercase
/// hex characters taken from a v4 UUID.
///
/// No shared counter is involved, so callers never contend on generation.
pub fn generate(prefix: &str, random_len: usize) -> String {
    let millis = Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string().to_uppercase();
    let len = random_len.min(random.len());
    format!("{prefix}-{millis}-{}", &random[..len])
}

pub fn order_number() -> String {
    generate("ORD", 8)
}

pub fn payment_reference() -> String {
    generate("PAY", 8)
}

pub fn tracking_number() -> String {
    generate("TRK", 6)
}

pub fn transaction_reference() -> String {
    generate("TXN", 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_has_prefix_timestamp_and_suffix() {
        let reference = order_number();
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn tracking_numbers_use_short_suffix() {
        let tracking = tracking_number();
        assert!(tracking.starts_with("TRK-"));
        assert_eq!(tracking.rsplit('-').next().unwrap().len(), 6);
    }

    #[test]
    fn references_are_unique() {
        let a = payment_reference();
        let b = payment_reference();
        assert_ne!(a, b);
    }
}
