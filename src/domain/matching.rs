// Keyword overlap scoring shared by report matching and widget suggestion

/// Lowercases and folds punctuation (`_`, `-`, commas) into spaces so "response_time" matches "Response Time".
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of keywords found in the text as whole words.
/// The final word of a keyword may carry a plural `s`/`es` ("breach" hits "breaches").
pub fn keyword_overlap(keywords: &[String], text: &str) -> usize {
    let haystack = normalize(text);
    let words: Vec<&str> = haystack.split(' ').filter(|w| !w.is_empty()).collect();
    keywords
        .iter()
        .filter(|k| {
            let keyword = normalize(k);
            let parts: Vec<&str> = keyword.split(' ').filter(|w| !w.is_empty()).collect();
            !parts.is_empty() && words.windows(parts.len()).any(|window| phrase_matches(&parts, window))
        })
        .count()
}

fn phrase_matches(parts: &[&str], window: &[&str]) -> bool {
    let last = parts.len() - 1;
    parts.iter().zip(window).enumerate().all(|(i, (part, word))| {
        part == word
            || (i == last
                && word
                    .strip_prefix(part)
                    .is_some_and(|suffix| suffix == "s" || suffix == "es"))
    })
}

/// True when the name equals one keyword, or all keywords joined, after normalization.
pub fn is_exact_name_match(keywords: &[String], name: &str) -> bool {
    let name = normalize(name);
    if name.is_empty() {
        return false;
    }
    if keywords.iter().any(|k| normalize(k) == name) {
        return true;
    }
    let joined = normalize(&keywords.join(" "));
    joined == name
}
