// SPDX-License-Identifier: PMPL-1.0-or-later

//! Base formula text parsing.
//!
//! Only the control list is taken from the text; outcomes, law terms,
//! fixed effects and clustering are attached per specification. Terms are
//! split on top-level `+`. A parenthesised group that spans a whole term is
//! cosmetic and gets flattened; any other group (a call such as
//! `i(region, year)`, or a group followed by an operator) is structural and
//! kept verbatim.

use crate::error::InputError;
use crate::types::{RTC, RTC_LAW, SYG, SYG_LAW, SYG_X_RTC};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseFormula {
    /// Left-hand side as written, e.g. `{outcome}`
    pub outcome_placeholder: String,
    /// Shared controls in declaration order, duplicates removed
    pub controls: Vec<String>,
}

impl BaseFormula {
    pub fn new(controls: Vec<String>) -> Self {
        Self {
            outcome_placeholder: "{outcome}".to_string(),
            controls,
        }
    }

    /// Parse `lhs ~ rhs [| fixed effects]`. Fixed effects written in the
    /// text are ignored; they follow from each model's dataset level.
    pub fn parse(text: &str) -> Result<Self, InputError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InputError::EmptyFormula);
        }
        check_balanced(text)?;

        let (lhs, rhs) = text
            .split_once('~')
            .ok_or_else(|| InputError::MissingTilde(text.to_string()))?;
        let rhs = top_level_split(rhs, '|')
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut controls: Vec<String> = Vec::new();
        for term in normalize_terms(&rhs) {
            if is_law_term(&term) || term == "1" || controls.contains(&term) {
                continue;
            }
            controls.push(term);
        }

        Ok(Self {
            outcome_placeholder: lhs.trim().to_string(),
            controls,
        })
    }
}

/// Split an expression into `+`-separated terms, flattening cosmetic
/// parentheses. Whitespace inside a term is collapsed.
pub fn normalize_terms(expr: &str) -> Vec<String> {
    let mut out = Vec::new();
    for term in top_level_split(expr, '+') {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        if wraps_whole_term(term) {
            out.extend(normalize_terms(&term[1..term.len() - 1]));
        } else {
            out.push(collapse_whitespace(term));
        }
    }
    out
}

fn is_law_term(term: &str) -> bool {
    matches!(term, SYG | RTC | SYG_X_RTC | SYG_LAW | RTC_LAW | "rtc:syg")
}

fn check_balanced(text: &str) -> Result<(), InputError> {
    let mut depth = 0i32;
    for ch in text.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(InputError::UnbalancedParens(text.to_string()));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(InputError::UnbalancedParens(text.to_string()));
    }
    Ok(())
}

fn top_level_split(expr: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for ch in expr.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    parts.push(current);
    parts
}

/// True when the term opens with `(` and that paren closes at the very end
fn wraps_whole_term(term: &str) -> bool {
    if !term.starts_with('(') || !term.ends_with(')') {
        return false;
    }
    let mut depth = 0i32;
    for (idx, ch) in term.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return idx == term.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

fn collapse_whitespace(term: &str) -> String {
    term.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_controls() {
        let f = BaseFormula::parse("{outcome} ~ poverty + unemployment + pop_density")
            .expect("formula should parse");
        assert_eq!(f.outcome_placeholder, "{outcome}");
        assert_eq!(f.controls, vec!["poverty", "unemployment", "pop_density"]);
    }

    #[test]
    fn flattens_cosmetic_groups() {
        let f = BaseFormula::parse("y ~ ((poverty + unemployment)) + (income)")
            .expect("formula should parse");
        assert_eq!(f.controls, vec!["poverty", "unemployment", "income"]);
    }

    #[test]
    fn keeps_structural_groups() {
        let f = BaseFormula::parse("y ~ poverty + i(region,  year) + (a + b):c")
            .expect("formula should parse");
        assert_eq!(f.controls, vec!["poverty", "i(region, year)", "(a + b):c"]);
    }

    #[test]
    fn unwraps_group_around_a_call() {
        let terms = normalize_terms("(i(region, year))");
        assert_eq!(terms, vec!["i(region, year)"]);
    }

    #[test]
    fn drops_law_terms_duplicates_and_fixed_effects() {
        let f = BaseFormula::parse("y ~ syg + rtc + syg:rtc + poverty + poverty | state + year")
            .expect("formula should parse");
        assert_eq!(f.controls, vec!["poverty"]);
    }

    #[test]
    fn rejects_malformed_text() {
        assert_eq!(BaseFormula::parse("   "), Err(InputError::EmptyFormula));
        assert!(matches!(
            BaseFormula::parse("y + x"),
            Err(InputError::MissingTilde(_))
        ));
        assert!(matches!(
            BaseFormula::parse("y ~ (x + z"),
            Err(InputError::UnbalancedParens(_))
        ));
        assert!(matches!(
            BaseFormula::parse("y ~ x) + (z"),
            Err(InputError::UnbalancedParens(_))
        ));
    }
}
