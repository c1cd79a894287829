//! Display aliases and value formatting for chart labels.

use glassbox_core::Value;
use std::collections::BTreeMap;

/// Exact-match replacement table for categorical values shown on charts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayAliases {
    aliases: BTreeMap<String, String>,
}

impl DisplayAliases {
    pub fn new(aliases: BTreeMap<String, String>) -> Self {
        Self { aliases }
    }

    /// The aliases used by the reference report.
    pub fn reference() -> Self {
        Self::new(glassbox_core::config::default_aliases())
    }

    /// Replace `value` when it matches an alias exactly; pass it through otherwise.
    pub fn apply<'a>(&'a self, value: &'a str) -> &'a str {
        self.aliases.get(value).map(String::as_str).unwrap_or(value)
    }

    /// Render a predictor value for display.
    pub fn display(&self, value: &Value) -> String {
        match value {
            Value::Numeric(v) => format_number(*v),
            Value::Categorical(s) => self.apply(s).to_string(),
        }
    }
}

/// Up to two decimals, trailing zeros trimmed.
pub fn format_number(v: f64) -> String {
    let s = format!("{:.2}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Signed two-decimal contribution label; `+` only when `plus` is set and the
/// value is positive.
pub fn format_contribution(v: f64, plus: bool) -> String {
    if plus && v > 0.0 {
        format!("+{:.2}", v)
    } else {
        format!("{:.2}", v)
    }
}
