//! Fuzzy "did you mean" suggestions for template errors

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// All filters registered in the template environment
pub const AVAILABLE_FILTERS: &[&str] = &[
    // Helper library
    "toyaml",
    "tojson",
    "b64encode",
    "b64decode",
    "quote",
    "squote",
    "nindent",
    "indent",
    "required",
    "empty",
    "haskey",
    "keys",
    "sha256",
    "trunc",
    "trimprefix",
    "trimsuffix",
    "snakecase",
    "kebabcase",
    "camelcase",
    "regex_replace",
    "regex_split",
    "regex_match",
    "contains",
    "hasprefix",
    "hassuffix",
    // Built-in MiniJinja filters
    "default",
    "upper",
    "lower",
    "title",
    "capitalize",
    "replace",
    "trim",
    "split",
    "join",
    "first",
    "last",
    "length",
    "reverse",
    "sort",
    "unique",
    "map",
    "select",
    "reject",
    "items",
    "int",
    "float",
    "string",
    "list",
    "bool",
    "urlencode",
];

/// All functions registered in the template environment
pub const AVAILABLE_FUNCTIONS: &[&str] = &[
    "fail", "dict", "list", "get", "index", "coalesce", "ternary", "tostring", "range",
];

#[derive(Debug, Clone)]
pub struct Suggestion {
    pub text: String,
    /// Levenshtein distance (lower = better match)
    pub distance: usize,
}

/// Find closest matches from a list of candidates
pub fn find_closest_matches(input: &str, candidates: &[&str], max_results: usize) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = strsim::levenshtein(input, candidate);
            (distance > 0 && distance <= MAX_SUGGESTION_DISTANCE).then(|| Suggestion {
                text: candidate.to_string(),
                distance,
            })
        })
        .collect();

    suggestions.sort_by_key(|s| s.distance);
    suggestions.truncate(max_results);
    suggestions
}

/// Suggest corrections for an unknown filter
pub fn suggest_unknown_filter(filter_name: &str) -> Option<String> {
    let matches = find_closest_matches(filter_name, AVAILABLE_FILTERS, 3);

    if matches.is_empty() {
        Some(format!(
            "Unknown filter `{}`. Common filters: upper, lower, trimprefix, regex_replace, toyaml, quote",
            filter_name
        ))
    } else {
        let suggestions: Vec<String> = matches.iter().map(|s| format!("`{}`", s.text)).collect();
        Some(format!("Did you mean {}?", suggestions.join(" or ")))
    }
}

/// Suggest corrections for an unknown function
pub fn suggest_unknown_function(func_name: &str) -> Option<String> {
    let matches = find_closest_matches(func_name, AVAILABLE_FUNCTIONS, 3);

    if matches.is_empty() {
        Some(format!(
            "Unknown function `{}`. Available functions: {}",
            func_name,
            AVAILABLE_FUNCTIONS.join(", ")
        ))
    } else {
        let suggestions: Vec<String> = matches.iter().map(|s| format!("`{}`", s.text)).collect();
        Some(format!("Did you mean {}?", suggestions.join(" or ")))
    }
}

/// Extract the first quoted name from an error message
///
/// Handles `` `foo` ``, `'foo'` and `"foo"`.
pub fn extract_quoted_name(msg: &str) -> Option<String> {
    for quote in ['`', '\'', '"'] {
        if let Some(start) = msg.find(quote) {
            let rest = &msg[start + 1..];
            if let Some(end) = rest.find(quote) {
                return Some(rest[..end].to_string());
            }
        }
    }
    None
}
