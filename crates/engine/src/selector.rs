//! Selector expressions: ordered fallbacks with optional merging.
//!
//! A selector is a comma-separated list of alternatives tried left to right;
//! the first one producing a non-empty value wins. In [`SelectorMode::Merge`]
//! each alternative is a `|`-separated list of sub-selectors whose non-empty
//! values are joined with commas.
//!
//! ```text
//! hostname,networkInterfaces          fallback
//! tags.items|labels.role,name         merge, then fall back to name
//! ```

use crate::error::ResolutionError;
use crate::field::{FieldAccessor, FieldPath};

/// How each alternative of a selector is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorMode {
    /// Each alternative is a single field path.
    Single,
    /// Each alternative is a `|`-separated list of field paths whose values are merged.
    Merge,
}

/// Operand parsed once; a syntax error is kept and reported when the operand is reached.
type Operand = Result<FieldPath, ResolutionError>;

/// A compiled selector expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    raw: String,
    mode: SelectorMode,
    alternatives: Vec<Vec<Operand>>,
}

impl Selector {
    pub fn compile(raw: &str, mode: SelectorMode) -> Self {
        let alternatives = raw
            .split(',')
            .map(|alternative| match mode {
                SelectorMode::Single => operands([alternative]),
                SelectorMode::Merge => operands(alternative.split('|')),
            })
            .filter(|operands| !operands.is_empty())
            .collect();
        Self {
            raw: raw.to_string(),
            mode,
            alternatives,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn mode(&self) -> SelectorMode {
        self.mode
    }

    /// True when the expression names no field at all.
    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// First syntax error in the expression, if any.
    pub fn syntax_error(&self) -> Option<&ResolutionError> {
        self.alternatives
            .iter()
            .flatten()
            .find_map(|operand| operand.as_ref().err())
    }

    /// Evaluate against `record`, returning `default` verbatim when no
    /// alternative produces a value.
    ///
    /// A malformed operand is only reported if evaluation reaches it.
    pub fn evaluate<A: FieldAccessor + ?Sized>(&self, record: &A, default: Option<&str>) -> Result<Option<String>, ResolutionError> {
        for alternative in &self.alternatives {
            let mut values = Vec::with_capacity(alternative.len());
            for operand in alternative {
                let path = operand.as_ref().map_err(Clone::clone)?;
                if let Some(value) = path.resolve(record)? {
                    values.push(value);
                }
            }
            if !values.is_empty() {
                return Ok(Some(values.join(",")));
            }
        }
        Ok(default.map(str::to_string))
    }
}

/// Compile and evaluate `expression` in one step.
pub fn evaluate<A: FieldAccessor + ?Sized>(
    record: &A,
    expression: &str,
    default: Option<&str>,
    mode: SelectorMode,
) -> Result<Option<String>, ResolutionError> {
    Selector::compile(expression, mode).evaluate(record, default)
}

fn operands<'a>(parts: impl IntoIterator<Item = &'a str>) -> Vec<Operand> {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(FieldPath::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodemap_types::ResourceRecord;
    use serde_json::json;

    fn record() -> ResourceRecord {
        ResourceRecord::from_value(json!({
            "id": "42",
            "name": "db-1",
            "a": "",
            "b": "x",
            "c": "y",
            "tags": { "items": ["web", "east"] },
            "labels": { "role": "primary" }
        }))
        .expect("record")
    }

    #[test]
    fn empty_expression_returns_default_verbatim() {
        let record = record();
        assert_eq!(evaluate(&record, "", Some("fallback"), SelectorMode::Single).unwrap().as_deref(), Some("fallback"));
        assert_eq!(evaluate(&record, "", Some(" spaced "), SelectorMode::Merge).unwrap().as_deref(), Some(" spaced "));
        assert_eq!(evaluate(&record, "", None, SelectorMode::Single).unwrap(), None);
        assert!(Selector::compile(" , ", SelectorMode::Single).is_empty());
    }

    #[test]
    fn falls_back_past_absent_and_empty_alternatives() {
        let record = record();
        assert_eq!(evaluate(&record, "a,b", None, SelectorMode::Single).unwrap().as_deref(), Some("x"));
        assert_eq!(evaluate(&record, "missing, c", None, SelectorMode::Single).unwrap().as_deref(), Some("y"));
        assert_eq!(evaluate(&record, "missing,a", Some("d"), SelectorMode::Single).unwrap().as_deref(), Some("d"));
    }

    #[test]
    fn merge_mode_joins_sub_selectors() {
        let record = record();
        assert_eq!(evaluate(&record, "b|c", None, SelectorMode::Merge).unwrap().as_deref(), Some("x,y"));
        assert_eq!(evaluate(&record, "a|c", None, SelectorMode::Merge).unwrap().as_deref(), Some("y"));
        assert_eq!(
            evaluate(&record, "tags.items|labels.role", None, SelectorMode::Merge).unwrap().as_deref(),
            Some("web,east,primary")
        );
    }

    #[test]
    fn merge_mode_falls_through_when_every_sub_selector_is_absent() {
        let record = record();
        assert_eq!(evaluate(&record, "a|missing,name", None, SelectorMode::Merge).unwrap().as_deref(), Some("db-1"));
        assert_eq!(evaluate(&record, "a|missing", Some("none"), SelectorMode::Merge).unwrap().as_deref(), Some("none"));
    }

    #[test]
    fn pipe_is_not_a_separator_outside_merge_mode() {
        let record = record();
        let error = evaluate(&record, "b|c", None, SelectorMode::Single).expect_err("malformed");
        assert!(matches!(error, ResolutionError::InvalidCharacter { character: '|', .. }));
    }

    #[test]
    fn malformed_operands_only_fail_when_reached() {
        let record = record();
        let selector = Selector::compile("b,bad..path", SelectorMode::Single);
        assert!(selector.syntax_error().is_some());
        assert_eq!(selector.evaluate(&record, None).unwrap().as_deref(), Some("x"));

        let selector = Selector::compile("missing,bad..path", SelectorMode::Single);
        assert!(matches!(selector.evaluate(&record, None), Err(ResolutionError::EmptySegment { .. })));
    }
}
