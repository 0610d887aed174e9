use nucleo_matcher::{
    Config, Matcher, Utf32Str,
    pattern::{CaseMatching, Normalization, Pattern},
};

/// Fuzzy score of `candidate` against `pattern` (None indicates no match).
/// Only used to order candidates that already matched in the same way.
pub fn fuzzy_score(pattern: &str, candidate: &str, case_sensitive: bool) -> Option<u32> {
    if pattern.is_empty() {
        return Some(0);
    }

    let mut matcher = Matcher::new(Config::DEFAULT);
    let case = if case_sensitive {
        CaseMatching::Respect
    } else {
        CaseMatching::Ignore
    };
    let pat = Pattern::parse(pattern, case, Normalization::Smart);

    let mut buf = Vec::new();
    let haystack = Utf32Str::new(candidate, &mut buf);

    pat.score(haystack, &mut matcher)
}
