//! Canonicalisation of free-text answers.
//!
//! Designers collapse spelling variants ("NYC", "new york city") onto a single label. The
//! mapping is keyed by normalized token so lookups ignore case and spacing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uppercase, trim and collapse whitespace runs to a single space.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Persistent token → canonical label table stored on a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMapping(BTreeMap<String, String>);

impl AnswerMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains_token(&self, token: &str) -> bool {
        self.0.contains_key(token)
    }

    /// Canonical label for a raw answer, if its normalized form is mapped.
    pub fn canonical_for(&self, raw: &str) -> Option<&str> {
        self.0.get(&normalize(raw)).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Tokens grouped by the canonical label they map to.
    pub fn grouped(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (token, label) in self.iter() {
            groups.entry(label).or_default().push(token);
        }
        groups
    }

    /// Point `tokens` at `canonical_label`, replacing every previous entry for that label.
    ///
    /// Returns the number of tokens now mapped to the label.
    pub fn reassign<I, S>(&mut self, tokens: I, canonical_label: &str) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.0.retain(|_, label| label != canonical_label);

        let mut mapped = 0;
        for token in tokens {
            let token = normalize(token.as_ref());
            if token.is_empty() {
                continue;
            }
            if self
                .0
                .insert(token, canonical_label.to_string())
                .is_none_or(|previous| previous != canonical_label)
            {
                mapped += 1;
            }
        }
        mapped
    }
}

impl FromIterator<(String, String)> for AnswerMapping {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn answer_strings(answer: &Value) -> Vec<&str> {
    match answer {
        Value::String(text) => vec![text.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// Distinct normalized tokens across `answers` that the mapping does not cover yet, sorted.
pub fn build_unmapped_list<'a, I>(answers: I, mapping: &AnswerMapping) -> Vec<String>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut tokens = BTreeSet::new();
    for answer in answers {
        for raw in answer_strings(answer) {
            let token = normalize(raw);
            if !token.is_empty() && !mapping.contains_token(&token) {
                tokens.insert(token);
            }
        }
    }
    tokens.into_iter().collect()
}

/// Apply the mapping to a raw answer value. Non-text answers yield `None`.
pub fn canonicalize(answer: &Value, mapping: &AnswerMapping) -> Option<Value> {
    let map_one = |raw: &str| -> Value {
        match mapping.canonical_for(raw) {
            Some(label) => Value::String(label.to_string()),
            None => Value::String(raw.to_string()),
        }
    };

    match answer {
        Value::String(text) => Some(map_one(text)),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .map(|item| match item.as_str() {
                    Some(text) => map_one(text),
                    None => item.clone(),
                })
                .collect(),
        )),
        _ => None,
    }
}
