//! Option matching against the configured target text.

use crate::voter::message::PollOption;

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Find the first option whose name equals `target`, ignoring case and
/// surrounding whitespace. No fuzzy or partial matching.
///
/// When this returns `None`, the caller must log the full list of available
/// option names so a mismatch can be diagnosed from the log alone.
pub fn find_matching_option<'a>(
    options: &'a [PollOption],
    target: &str,
) -> Option<&'a PollOption> {
    let wanted = normalize(target);
    options.iter().find(|opt| normalize(&opt.name) == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(names: &[&str]) -> Vec<PollOption> {
        names.iter().map(|n| PollOption::new(*n)).collect()
    }

    #[test]
    fn test_exact_match() {
        let opts = options(&["Yes", "No"]);
        assert_eq!(find_matching_option(&opts, "Yes").unwrap().name, "Yes");
    }

    #[test]
    fn test_case_insensitive() {
        let opts = options(&["yes"]);
        assert_eq!(find_matching_option(&opts, "Yes").unwrap().name, "yes");

        let opts = options(&["YES"]);
        assert_eq!(find_matching_option(&opts, "Yes").unwrap().name, "YES");
    }

    #[test]
    fn test_whitespace_insensitive() {
        let opts = options(&[" Yes "]);
        assert_eq!(find_matching_option(&opts, "Yes").unwrap().name, " Yes ");

        let opts = options(&["Yes"]);
        assert_eq!(find_matching_option(&opts, "  yes  ").unwrap().name, "Yes");
    }

    #[test]
    fn test_no_partial_match() {
        let opts = options(&["Yes, definitely", "Not yes"]);
        assert!(find_matching_option(&opts, "Yes").is_none());
    }

    #[test]
    fn test_no_match() {
        let opts = options(&["Maybe", "No"]);
        assert!(find_matching_option(&opts, "Yes").is_none());
    }

    #[test]
    fn test_empty_options() {
        assert!(find_matching_option(&[], "Yes").is_none());
    }

    #[test]
    fn test_duplicate_names_return_first() {
        let opts = options(&["No", " yes", "Yes"]);
        // First match in poll order wins, even with duplicate names.
        assert_eq!(find_matching_option(&opts, "Yes").unwrap().name, " yes");
    }
}
