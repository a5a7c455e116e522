use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;

use crate::db_types::{OrderNumber, Reference};

/// Generates a fresh gateway reference: `PAY-<unix millis>-<6 random alphanumerics>`. The timestamp keeps
/// references sortable and collisions implausible; the random suffix covers two links created in the same
/// millisecond.
pub fn new_payment_reference() -> Reference {
    Reference(format!("PAY-{}-{}", Utc::now().timestamp_millis(), random_suffix(6)))
}

/// Generates a fresh human-facing order number: `ORD-<unix millis>-<4 random alphanumerics>`.
pub fn new_order_number() -> OrderNumber {
    OrderNumber(format!("ORD-{}-{}", Utc::now().timestamp_millis(), random_suffix(4)))
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(|c| (c as char).to_ascii_uppercase()).collect()
}

/// Checks a reference against the gateway's allowed character set. References arriving from outside (webhook
/// payloads, public verify calls) go through this before being used in a lookup.
pub fn valid_reference(s: &str) -> bool {
    let re = Regex::new(r"^[A-Za-z0-9\-=.]+$").unwrap();
    !s.is_empty() && s.len() <= 100 && re.is_match(s)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn references_have_the_documented_shape() {
        let reference = new_payment_reference();
        let parts: Vec<&str> = reference.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "PAY");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
        assert!(valid_reference(reference.as_str()));
    }

    #[test]
    fn order_numbers_have_the_documented_shape() {
        let number = new_order_number();
        assert!(number.as_str().starts_with("ORD-"));
        assert_eq!(number.as_str().split('-').count(), 3);
    }

    #[test]
    fn consecutive_identifiers_differ() {
        assert_ne!(new_payment_reference(), new_payment_reference());
        assert_ne!(new_order_number(), new_order_number());
    }

    #[test]
    fn reference_validation() {
        assert!(valid_reference("PAY-1718908500000-A1B2C3"));
        assert!(valid_reference("ref=checkout.1"));
        assert!(!valid_reference(""));
        assert!(!valid_reference("has space"));
        assert!(!valid_reference("semi;colon"));
        assert!(!valid_reference(&"x".repeat(101)));
    }
}
