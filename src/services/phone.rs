/// Kenyan mobile number normalization, shared by the intake and payment
/// paths. Formatting characters are stripped first, then:
///   0712345678 / 0112345678 -> 254712345678 / 254112345678
///   712345678               -> 254712345678
///   254712345678            -> unchanged
/// Everything else is invalid.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let s: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '+' | '(' | ')' | '-'))
        .collect();

    if !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    if s.len() == 10 && s.starts_with('0') && matches!(s.as_bytes()[1], b'1' | b'7') {
        return Some(format!("254{}", &s[1..]));
    }
    if s.len() == 9 && s.starts_with('7') {
        return Some(format!("254{}", s));
    }
    if s.len() == 12 && s.starts_with("2547") {
        return Some(s);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_valid_local_forms() {
        assert_eq!(normalize_phone("0712345678").as_deref(), Some("254712345678"));
        assert_eq!(normalize_phone("712345678").as_deref(), Some("254712345678"));
        assert_eq!(normalize_phone("254712345678").as_deref(), Some("254712345678"));
        assert_eq!(normalize_phone("0112345678").as_deref(), Some("254112345678"));
    }

    #[test]
    fn strips_formatting_characters() {
        assert_eq!(normalize_phone("+254 712 345 678").as_deref(), Some("254712345678"));
        assert_eq!(normalize_phone("(0712)-345-678").as_deref(), Some("254712345678"));
        assert_eq!(normalize_phone("  0712345678  ").as_deref(), Some("254712345678"));
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("0812345678"), None); // bad operator prefix
        assert_eq!(normalize_phone("254112345678"), None); // only 2547... accepted fully formed
        assert_eq!(normalize_phone("07123456789"), None); // too long
        assert_eq!(normalize_phone("071234567"), None); // too short
        assert_eq!(normalize_phone("07123a5678"), None); // non-digit
    }
}
