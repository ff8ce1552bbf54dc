use std::sync::LazyLock;

use regex::Regex;
use wealthsignal_common::normalize_name;

/// Names that never identify a reachable person.
const STOP_LIST: &[&str] = &[
    "unknown",
    "n/a",
    "none",
    "anonymous",
    "not named",
    "unnamed",
    "the founders",
    "the founder",
    "founders",
    "the family",
    "family",
    "the owners",
    "owners",
    "the owner",
    "the seller",
    "the sellers",
    "sellers",
    "the buyer",
    "the buyers",
    "investors",
    "the investors",
    "shareholders",
    "the shareholders",
    "management",
    "the management",
    "the board",
    "the ceo",
    "ceo",
    "employees",
    "the heirs",
    "heirs",
    "private equity fund",
    "the company",
];

/// Descriptions that point at people without naming them: "the founders of
/// Acme", "the Holm family", "owners of Danske Rør".
static VAGUE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(the\s+)?(co-?)?(founders?|owners?|family|families|heirs?|sellers?|shareholders?|management)\b|\b(family|families|heirs|owners|founders)\b")
        .expect("valid vague-name regex")
});

/// Stop-listed names are rejected outright.
pub fn is_stop_listed(name: &str) -> bool {
    let normalized = normalize_name(name);
    normalized.is_empty() || STOP_LIST.iter().any(|s| normalized == *s)
}

/// Whether a name describes a group instead of naming someone, and is worth
/// a disambiguation search.
pub fn is_vague(name: &str) -> bool {
    VAGUE_NAME.is_match(name.trim())
}

/// Wealth must strictly exceed the floor.
pub fn clears_wealth_floor(wealth_mm: f64, floor_mm: f64) -> bool {
    wealth_mm.is_finite() && wealth_mm > floor_mm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_phrases_are_stop_listed() {
        assert!(is_stop_listed("The Founders"));
        assert!(is_stop_listed("  unknown "));
        assert!(is_stop_listed(""));
        assert!(!is_stop_listed("Anders Holch Povlsen"));
        assert!(!is_stop_listed("the founders of Acme ApS"));
    }

    #[test]
    fn group_descriptions_are_vague() {
        assert!(is_vague("the founders of Acme ApS"));
        assert!(is_vague("the Holm family owners of Danske Rør"));
        assert!(is_vague("Owners of Nordic Pipes"));
        assert!(!is_vague("Jens Holm"));
        assert!(!is_vague("Familia Investments CEO Ole Hansen"));
    }

    #[test]
    fn wealth_floor_is_strict() {
        assert!(!clears_wealth_floor(30.0, 30.0));
        assert!(clears_wealth_floor(30.1, 30.0));
        assert!(!clears_wealth_floor(f64::NAN, 30.0));
    }
}
