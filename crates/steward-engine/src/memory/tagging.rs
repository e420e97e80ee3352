//! Keyword-derived tags.

use super::similarity::tokenize;

/// Tag and the keywords that imply it.
const TAG_KEYWORDS: &[(&str, &[&str])] = &[
    ("auth", &["auth", "login", "password"]),
    ("testing", &["test", "pytest", "jest"]),
    ("config", &["config", "settings", "env"]),
    ("database", &["database", "db", "sql", "migration"]),
    ("api", &["api", "endpoint", "route", "handler"]),
    ("security", &["security", "vulnerability", "cve"]),
    ("performance", &["performance", "optimize", "slow", "fast"]),
    ("bugfix", &["bug", "fix", "error", "crash"]),
    ("refactor", &["refactor", "cleanup", "improve"]),
    ("setup", &["install", "setup", "dependency"]),
];

/// Endings a keyword may carry and still count as the same word.
const INFLECTIONS: &[&str] = &["", "s", "es", "d", "ed", "ing"];

/// Tags implied by the words in `content`, in table order.
///
/// Keywords match whole words, optionally inflected, so "tests" implies
/// `testing` and "migrations" implies `database` while "author" implies
/// nothing. Snake-case identifiers are split into words.
pub fn auto_tags(content: &str) -> Vec<String> {
    let tokens = tokenize(content);
    let words: Vec<&str> = tokens
        .iter()
        .flat_map(|token| token.split('_'))
        .filter(|w| !w.is_empty())
        .collect();
    TAG_KEYWORDS
        .iter()
        .filter(|(_, keywords)| {
            words
                .iter()
                .any(|word| keywords.iter().any(|kw| is_inflection_of(word, kw)))
        })
        .map(|(tag, _)| tag.to_string())
        .collect()
}

fn is_inflection_of(word: &str, keyword: &str) -> bool {
    word.strip_prefix(keyword)
        .is_some_and(|rest| INFLECTIONS.contains(&rest))
}

/// Trim, lowercase and de-duplicate tags, keeping first-seen order.
pub(crate) fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
