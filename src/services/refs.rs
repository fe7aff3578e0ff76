use chrono::Utc;
use uuid::Uuid;

/// Order reference for a new submission: `FI-<base36 epoch millis>-<6 hex>`.
/// The millisecond timestamp plus the random suffix make reuse practically
/// impossible.
pub fn generate_order_ref() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("FI-{}-{}", base36(millis as u64), &suffix[..6])
}

/// Fallback reference for a payment initiated without an account reference.
pub fn default_payment_ref() -> String {
    format!("order-{}", Utc::now().timestamp_millis())
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_encodes_like_js_tostring() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
        assert_eq!(base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn order_ref_has_expected_shape() {
        let order_ref = generate_order_ref();
        let parts: Vec<&str> = order_ref.splitn(3, '-').collect();
        assert_eq!(parts[0], "FI");
        assert!(parts[1].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn order_refs_are_unique() {
        let a = generate_order_ref();
        let b = generate_order_ref();
        assert_ne!(a, b);
    }

    #[test]
    fn default_payment_ref_is_prefixed() {
        assert!(default_payment_ref().starts_with("order-"));
    }
}
