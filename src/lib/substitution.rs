//! Placeholder substitution for contract templates.
//!
//! Templates carry literal bracketed tokens such as `[CompanyName]`. A
//! [`SubstitutionRules`] value holds an ordered list of `(token, value)` pairs
//! and replaces every literal occurrence of each token, one rule after the
//! other, in insertion order.
//!
//! Because the rules run sequentially over the whole text, a value inserted by
//! an earlier rule is scanned again by every later rule:
//!
//! ```rust
//! use contract2pdf::substitution::SubstitutionRules;
//!
//! let mut rules = SubstitutionRules::new();
//! rules.insert("[A]", "[B]");
//! rules.insert("[B]", "b");
//! assert_eq!(rules.apply("[A] [B]"), "b b");
//!
//! // Reversed order leaves the inserted token alone.
//! let mut rules = SubstitutionRules::new();
//! rules.insert("[B]", "b");
//! rules.insert("[A]", "[B]");
//! assert_eq!(rules.apply("[A] [B]"), "[B] b");
//! ```
//!
//! Tokens without a rule are left in the text untouched; there is no error for
//! a missing key. [`unresolved_tokens`] reports what is left over.

/// Ordered `(token, value)` replacement rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionRules {
    rules: Vec<(String, String)>,
}

impl SubstitutionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule. Inserting a token that already has a rule replaces its
    /// value and keeps its original position.
    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        let token = token.into();
        let value = value.into();
        match self.rules.iter_mut().find(|(t, _)| *t == token) {
            Some(rule) => rule.1 = value,
            None => self.rules.push((token, value)),
        }
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies every rule to `template` in insertion order and returns the
    /// transformed text.
    pub fn apply(&self, template: &str) -> String {
        let mut text = template.to_string();
        for (token, value) in &self.rules {
            // An empty token would match between every character.
            if token.is_empty() || !text.contains(token.as_str()) {
                continue;
            }
            text = text.replace(token.as_str(), value);
        }
        text
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SubstitutionRules {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut rules = SubstitutionRules::new();
        for (token, value) in iter {
            rules.insert(token, value);
        }
        rules
    }
}

/// Free-function form of [`SubstitutionRules::apply`].
pub fn substitute(template: &str, rules: &SubstitutionRules) -> String {
    rules.apply(template)
}

/// Appends a `%` sign unless the input already ends with one.
///
/// ```rust
/// use contract2pdf::substitution::normalize_percentage;
/// assert_eq!(normalize_percentage("25"), "25%");
/// assert_eq!(normalize_percentage("25%"), "25%");
/// ```
pub fn normalize_percentage(input: &str) -> String {
    if input.ends_with('%') {
        input.to_string()
    } else {
        format!("{}%", input)
    }
}

/// Returns the bracketed placeholder tokens (`[Word]`) still present in
/// `text`, in order of first appearance, without duplicates.
///
/// Only tokens made of ASCII letters, digits and underscores count, so
/// ordinary bracketed prose like `[siehe Anlage 1]` is not reported.
pub fn unresolved_tokens(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) => {
                let name = &after[..close];
                let is_token = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_');
                if is_token {
                    let token = format!("[{}]", name);
                    if !found.contains(&token) {
                        found.push(token);
                    }
                    rest = &after[close + 1..];
                } else {
                    rest = after;
                }
            }
            None => break,
        }
    }
    found
}
