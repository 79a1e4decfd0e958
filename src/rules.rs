/// Provider detection for captured exchanges.
///
/// A small JSON-configurable rule set decides whether an exchange looks like
/// LLM traffic and which provider family produced it. Rules probe response
/// headers (regex on name/value) and body text (substring containment); a rule
/// matches when every header probe is satisfied by some header and any body
/// probe hits. Invalid user-supplied regexes are dropped silently — a broken
/// rule file must not take the inspector down.
use regex_lite::Regex;
use serde::Deserialize;

use crate::capture::Header;

#[derive(Debug, Clone, Deserialize)]
struct RawHeaderRule {
    #[serde(default)]
    name_regex: Option<String>,
    #[serde(default)]
    value_regex: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRule {
    provider: String,
    /// All header rules must be satisfied; any header can satisfy each rule.
    #[serde(default)]
    headers: Option<Vec<RawHeaderRule>>,
    /// Simple substring containment, any one suffices.
    #[serde(default)]
    body_contains_any: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRuleSet {
    rules: Vec<RawRule>,
}

#[derive(Debug, Clone)]
struct HeaderRule {
    name: Option<Regex>,
    value: Option<Regex>,
}

#[derive(Debug, Clone)]
struct ProviderRule {
    provider: String,
    headers: Vec<HeaderRule>,
    body_contains_any: Vec<String>,
}

/// Compiled provider-detection rule set.
#[derive(Debug, Clone, Default)]
pub struct ProviderRules {
    rules: Vec<ProviderRule>,
}

const DEFAULT_RULES_JSON: &str = r#"{
  "rules": [
    {
      "provider": "openai_compatible",
      "body_contains_any": ["\"choices\""]
    },
    {
      "provider": "ollama",
      "body_contains_any": ["\"message\"", "\"response\"", "\"model\""]
    }
  ]
}"#;

fn compile_regex(source: Option<&String>) -> Option<Regex> {
    match source {
        Some(s) if !s.is_empty() => Regex::new(s).ok(),
        _ => None,
    }
}

fn compile_rule(raw: RawRule) -> ProviderRule {
    let headers = raw
        .headers
        .unwrap_or_default()
        .iter()
        .map(|hr| HeaderRule {
            name: compile_regex(hr.name_regex.as_ref()),
            value: compile_regex(hr.value_regex.as_ref()),
        })
        .collect();
    ProviderRule {
        provider: raw.provider,
        headers,
        body_contains_any: raw.body_contains_any.unwrap_or_default(),
    }
}

impl ProviderRule {
    fn headers_match(&self, headers: &[Header]) -> bool {
        'rules: for hr in &self.headers {
            for h in headers {
                let name_ok = hr.name.as_ref().map_or(true, |rx| rx.is_match(&h.name));
                let value_ok = hr.value.as_ref().map_or(true, |rx| rx.is_match(&h.value));
                if name_ok && value_ok {
                    continue 'rules;
                }
            }
            return false;
        }
        true
    }

    fn body_matches(&self, text: &str) -> bool {
        if self.body_contains_any.is_empty() {
            return true;
        }
        self.body_contains_any
            .iter()
            .any(|needle| text.contains(needle))
    }
}

impl ProviderRules {
    /// Parse a rule set from JSON; `None` on malformed input.
    #[must_use]
    pub fn from_json_str(s: &str) -> Option<Self> {
        let raw: RawRuleSet = serde_json::from_str(s).ok()?;
        Some(Self {
            rules: raw.rules.into_iter().map(compile_rule).collect(),
        })
    }

    /// Load rules from an optional user-supplied file, falling back to the
    /// built-in defaults when the file is absent or malformed.
    #[must_use]
    pub fn load(path: Option<&str>) -> Self {
        if let Some(path) = path {
            match std::fs::read_to_string(path) {
                Ok(s) => {
                    if let Some(rules) = Self::from_json_str(&s) {
                        return rules;
                    }
                    tracing::warn!(path, "malformed rules file, using built-in defaults");
                }
                Err(e) => {
                    tracing::warn!(path, error = %e, "unreadable rules file, using built-in defaults");
                }
            }
        }
        Self::from_json_str(DEFAULT_RULES_JSON).unwrap_or_default()
    }

    /// Match an exchange by its captured headers and accumulated body text.
    #[must_use]
    pub fn match_exchange(&self, headers: &[Header], text: &str) -> Option<String> {
        self.rules
            .iter()
            .find(|rule| rule.headers_match(headers) && rule.body_matches(text))
            .map(|rule| rule.provider.clone())
    }

    /// Match by body text alone, for callers without header context.
    #[must_use]
    pub fn match_text_only(&self, text: &str) -> Option<String> {
        self.rules
            .iter()
            .find(|rule| {
                rule.body_contains_any
                    .iter()
                    .any(|needle| text.contains(needle))
            })
            .map(|rule| rule.provider.clone())
    }
}
