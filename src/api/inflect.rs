//! Word fragments and singular/plural inflection
//!
//! A small dictionary-backed inflector: irregular pairs and uncountable
//! words are looked up first, then the regular English suffix rules apply.

use std::collections::{HashMap, HashSet};

const IRREGULAR: &[(&str, &str)] = &[
    ("alias", "aliases"),
    ("analysis", "analyses"),
    ("appendix", "appendices"),
    ("axis", "axes"),
    ("basis", "bases"),
    ("cache", "caches"),
    ("calorie", "calories"),
    ("child", "children"),
    ("cookie", "cookies"),
    ("criterion", "criteria"),
    ("curriculum", "curricula"),
    ("diagnosis", "diagnoses"),
    ("foot", "feet"),
    ("hypothesis", "hypotheses"),
    ("index", "indices"),
    ("man", "men"),
    ("matrix", "matrices"),
    ("medium", "media"),
    ("mouse", "mice"),
    ("movie", "movies"),
    ("niche", "niches"),
    ("person", "people"),
    ("phenomenon", "phenomena"),
    ("pie", "pies"),
    ("status", "statuses"),
    ("stratum", "strata"),
    ("tie", "ties"),
    ("tooth", "teeth"),
    ("vertex", "vertices"),
    ("woman", "women"),
];

const UNCOUNTABLE: &[&str] = &[
    "data",
    "equipment",
    "evidence",
    "feedback",
    "fish",
    "information",
    "metadata",
    "news",
    "series",
    "sheep",
    "software",
    "species",
];

/// Split a camelCase / PascalCase name into its capitalized word fragments.
///
/// `studyVersions` -> `["study", "Versions"]`, `HTTPServer` -> `["HTTP", "Server"]`.
pub fn word_fragments(name: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = name.char_indices().collect();
    let mut fragments = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        let (pos, c) = chars[i];
        let prev = chars[i - 1].1;
        let next_lower = chars.get(i + 1).map(|(_, n)| n.is_lowercase()).unwrap_or(false);

        let boundary = c.is_uppercase()
            && (prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower));
        if boundary {
            fragments.push(&name[start..pos]);
            start = pos;
        }
    }
    if start < name.len() {
        fragments.push(&name[start..]);
    }
    fragments
}

/// Singular/plural dictionary
#[derive(Debug, Clone)]
pub struct Inflector {
    singular_to_plural: HashMap<String, String>,
    plural_to_singular: HashMap<String, String>,
    uncountable: HashSet<String>,
}

impl Default for Inflector {
    fn default() -> Self {
        let mut inflector = Self {
            singular_to_plural: HashMap::new(),
            plural_to_singular: HashMap::new(),
            uncountable: UNCOUNTABLE.iter().map(|s| s.to_string()).collect(),
        };
        for (singular, plural) in IRREGULAR {
            inflector.add_irregular(singular, plural);
        }
        inflector
    }
}

impl Inflector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in dictionary extended with extra irregular pairs and uncountable words
    pub fn with_overrides<'a>(
        irregular: impl IntoIterator<Item = (&'a String, &'a String)>,
        uncountable: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let mut inflector = Self::default();
        for (singular, plural) in irregular {
            inflector.add_irregular(singular, plural);
        }
        for word in uncountable {
            inflector.uncountable.insert(word.to_lowercase());
        }
        inflector
    }

    pub fn add_irregular(&mut self, singular: &str, plural: &str) {
        let (singular, plural) = (singular.to_lowercase(), plural.to_lowercase());
        self.plural_to_singular.insert(plural.clone(), singular.clone());
        self.singular_to_plural.insert(singular, plural);
    }

    /// Word has no distinct plural form
    pub fn is_uncountable(&self, word: &str) -> bool {
        self.uncountable.contains(&word.to_lowercase())
    }

    /// If `word` is a recognized plural, its singular form (matching the
    /// word's leading capitalization); `None` for singular or uncountable words.
    pub fn singular_of(&self, word: &str) -> Option<String> {
        let lower = word.to_lowercase();
        if self.is_uncountable(&lower) || self.singular_to_plural.contains_key(&lower) {
            return None;
        }
        let singular = match self.plural_to_singular.get(&lower) {
            Some(s) => s.clone(),
            None => singularize_regular(&lower)?,
        };
        Some(match_case(word, &singular))
    }
}

fn singularize_regular(word: &str) -> Option<String> {
    if word.len() > 3 && word.ends_with("ies") {
        return Some(format!("{}y", &word[..word.len() - 3]));
    }
    if word.ends_with("sses") || ["xes", "ches", "shes", "zzes"].iter().any(|s| word.ends_with(s)) {
        return Some(word[..word.len() - 2].to_string());
    }
    if word.ends_with("yses") {
        return Some(format!("{}sis", &word[..word.len() - 3]));
    }
    if ["ss", "us", "is"].iter().any(|s| word.ends_with(s)) {
        return None;
    }
    if word.len() > 1 && word.ends_with('s') {
        return Some(word[..word.len() - 1].to_string());
    }
    None
}

/// Apply the capitalization of `model`'s first character to `word`
fn match_case(model: &str, word: &str) -> String {
    let upper = model.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if upper => first.to_uppercase().chain(chars).collect(),
        _ => word.to_string(),
    }
}
