//! Fuzzy title verification.

use rapidfuzz::fuzz;
use tracing::debug;

/// Minimum similarity for a downloaded document to be kept.
pub const TITLE_MATCH_THRESHOLD: f64 = 0.80;

/// Tolerance applied at the threshold so exact 0.80 ratios are not lost to rounding.
const THRESHOLD_EPSILON: f64 = 1e-9;

/// Indel similarity of two titles in `[0.0, 1.0]`.
///
/// `1 - indel_distance / (len_a + len_b)`, counted in chars, where a
/// substitution costs one deletion plus one insertion. An appended site
/// suffix or a truncated title therefore costs only the missing part.
/// Case-insensitive; leading and trailing whitespace is ignored.
///
/// # Examples
///
/// ```
/// use refcrawler_core::pipeline::title_similarity;
///
/// assert_eq!(title_similarity("Deep Learning", "  deep learning "), 1.0);
/// assert!(title_similarity("Deep Learning", "Shallow Parsing") < 0.5);
/// ```
#[must_use]
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    fuzz::ratio(a.chars(), b.chars())
}

/// Returns true if `page` is close enough to `official` to keep the document.
///
/// A missing or blank title on either side is never a match.
#[must_use]
pub fn titles_match(official: Option<&str>, page: Option<&str>) -> bool {
    let (Some(official), Some(page)) = (official, page) else {
        debug!("title missing; cannot verify");
        return false;
    };
    if official.trim().is_empty() || page.trim().is_empty() {
        debug!("title blank; cannot verify");
        return false;
    }
    let ratio = title_similarity(official, page);
    let matched = ratio + THRESHOLD_EPSILON >= TITLE_MATCH_THRESHOLD;
    debug!(ratio, matched, official, page, "title similarity");
    matched
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_identical_ignoring_case() {
        assert!((title_similarity("ABC def", "abc DEF") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_disjoint() {
        assert!(title_similarity("aaaa", "bbbb").abs() < f64::EPSILON);
    }

    #[test]
    fn test_threshold_boundary_exact() {
        // 10 chars, 2 substitutions => 1 - 4/20 = 0.80
        assert!(titles_match(Some("abcdefghij"), Some("abcdefghXY")));
    }

    #[test]
    fn test_threshold_boundary_below() {
        // 100 chars, 21 substitutions => 1 - 42/200 = 0.79
        let official = "a".repeat(100);
        let page = format!("{}{}", "a".repeat(79), "b".repeat(21));
        assert!((title_similarity(&official, &page) - 0.79).abs() < 1e-9);
        assert!(!titles_match(Some(&official), Some(&page)));
    }

    #[test]
    fn test_missing_titles_never_match() {
        assert!(!titles_match(None, Some("x")));
        assert!(!titles_match(Some("x"), None));
        assert!(!titles_match(Some("  "), Some("  ")));
    }

    #[test]
    fn test_page_title_with_site_suffix() {
        assert!(titles_match(
            Some("Limits to Growth"),
            Some("Limits to growth.")
        ));
        assert!(!titles_match(
            Some("Limits to Growth"),
            Some("Limits to Growth | Science Magazine Online")
        ));
    }

    #[test]
    fn test_journal_suffix_on_page_title_is_kept() {
        // 40 + 57 chars, 17 inserted => 1 - 17/97 = 0.825
        let official = "Quantum Entanglement in Photonic Systems";
        let page = format!("{official} | Nature Physics");
        assert!((title_similarity(official, &page) - 80.0 / 97.0).abs() < 1e-9);
        assert!(titles_match(Some(official), Some(&page)));
    }

    #[test]
    fn test_truncated_page_title_is_kept() {
        // 10 + 7 chars, 3 deleted => 1 - 3/17 = 0.824
        assert!((title_similarity("abcdefghij", "abcdefg") - 14.0 / 17.0).abs() < 1e-9);
        assert!(titles_match(Some("abcdefghij"), Some("abcdefg")));
    }

    #[test]
    fn test_insertions_at_threshold_boundary() {
        // 8 + 12 chars, 4 inserted => exactly 0.80
        assert!(titles_match(Some("abcdefgh"), Some("abcdefghWXYZ")));
        // 8 + 13 chars, 5 inserted => 16/21 = 0.76
        assert!(!titles_match(Some("abcdefgh"), Some("abcdefghVWXYZ")));
    }
}
