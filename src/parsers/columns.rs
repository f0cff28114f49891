// ==============================================================================
// columns.rs - Column Match Rules
// ==============================================================================
// Description: Header sniffing for coefficient and beta tables
// Author: Matt Barham
// Created: 2026-03-03
// Modified: 2026-03-06
// Version: 1.0.0
// ==============================================================================
// Columns are matched by name against an ordered rule list. The first column
// (left to right) that satisfies any rule wins; otherwise a fixed fallback
// position is used.
// ==============================================================================

/// A single header-name test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Name contains the token (case-sensitive)
    Contains(&'static str),
    /// Name contains the token, ignoring ASCII case
    ContainsIgnoreCase(&'static str),
    /// Name equals the token exactly
    Exact(&'static str),
}

impl MatchRule {
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        match self {
            MatchRule::Contains(token) => name.contains(token),
            MatchRule::ContainsIgnoreCase(token) => {
                name.to_ascii_lowercase().contains(&token.to_ascii_lowercase())
            }
            MatchRule::Exact(token) => name == *token,
        }
    }
}

/// Identifier column: "Probe", "probe_id", "CpG"-style names, or the Horvath "CpGmarker"
pub const IDENTIFIER_RULES: &[MatchRule] = &[
    MatchRule::ContainsIgnoreCase("probe"),
    MatchRule::ContainsIgnoreCase("cg"),
    MatchRule::Exact("CpGmarker"),
];

/// Weight column: "Coefficient", "coef", "CoefficientTraining", "weight"
pub const WEIGHT_RULES: &[MatchRule] = &[
    MatchRule::ContainsIgnoreCase("coefficient"),
    MatchRule::ContainsIgnoreCase("coef"),
    MatchRule::ContainsIgnoreCase("weight"),
];

/// Tokens that mark a first line as the real header row
pub const HEADER_MARKERS: &[MatchRule] = &[
    MatchRule::Contains("CpGmarker"),
    MatchRule::ContainsIgnoreCase("probe"),
];

pub const IDENTIFIER_FALLBACK: usize = 0;
pub const WEIGHT_FALLBACK: usize = 1;

/// Resolved column position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMatch {
    pub index: usize,
    pub name: String,
    /// False when the fallback position was used
    pub matched: bool,
}

/// Find the first header matching any rule, else the fallback position
pub fn find_column<'a, I>(headers: I, rules: &[MatchRule], fallback: usize) -> Option<ColumnMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    let headers: Vec<&str> = headers.into_iter().collect();

    let found = headers
        .iter()
        .position(|name| rules.iter().any(|rule| rule.matches(name)));

    match found {
        Some(index) => Some(ColumnMatch {
            index,
            name: headers[index].trim().to_string(),
            matched: true,
        }),
        None => headers.get(fallback).map(|name| ColumnMatch {
            index: fallback,
            name: name.trim().to_string(),
            matched: false,
        }),
    }
}

/// True if the line looks like the real header row
pub fn is_header_line(line: &str) -> bool {
    HEADER_MARKERS.iter().any(|rule| rule.matches(line))
}

/// Drop a leading comment/title block
///
/// If the first line is not a recognizable header, the first `skip_lines`
/// lines are removed. Returns the remaining text and the number of lines
/// dropped.
pub fn strip_preamble(text: &str, skip_lines: usize) -> (&str, usize) {
    let first_line = text.lines().next().unwrap_or("");
    if skip_lines == 0 || is_header_line(first_line) {
        return (text, 0);
    }

    let mut offset = 0;
    let mut dropped = 0;
    for line in text.split_inclusive('\n').take(skip_lines) {
        offset += line.len();
        dropped += 1;
    }

    (&text[offset..], dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_column_rules() {
        let m = find_column(["CpGmarker", "CoefficientTraining"], IDENTIFIER_RULES, 0).unwrap();
        assert_eq!(m.index, 0);
        assert!(m.matched);

        let m = find_column(["gene", "probe_id", "coef"], IDENTIFIER_RULES, 0).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.name, "probe_id");

        let m = find_column(["name", "value"], IDENTIFIER_RULES, 0).unwrap();
        assert_eq!(m.index, 0);
        assert!(!m.matched);
    }

    #[test]
    fn test_weight_column_rules() {
        let m = find_column(["CpGmarker", "CoefficientTraining", "medianByCpG"], WEIGHT_RULES, 1)
            .unwrap();
        assert_eq!(m.name, "CoefficientTraining");

        let m = find_column(["id", "Weight"], WEIGHT_RULES, 1).unwrap();
        assert_eq!(m.index, 1);
        assert!(m.matched);

        let m = find_column(["id", "value", "other"], WEIGHT_RULES, 1).unwrap();
        assert_eq!(m.index, 1);
        assert!(!m.matched);

        assert!(find_column(["only"], WEIGHT_RULES, 1).is_none());
    }

    #[test]
    fn test_leftmost_column_wins_over_rule_order() {
        // "weight" (third rule) sits left of "coef" (second rule)
        let m = find_column(["id", "weight", "coef"], WEIGHT_RULES, 1).unwrap();
        assert_eq!(m.name, "weight");
    }

    #[test]
    fn test_strip_preamble() {
        let text = "Additional file 3\n\nCpGmarker,CoefficientTraining\ncg1,0.5\n";
        let (rest, dropped) = strip_preamble(text, 2);
        assert_eq!(dropped, 2);
        assert!(rest.starts_with("CpGmarker"));

        let text = "Probe,Coefficient\ncg1,0.5\n";
        let (rest, dropped) = strip_preamble(text, 2);
        assert_eq!(dropped, 0);
        assert_eq!(rest, text);

        let (rest, dropped) = strip_preamble("title only", 2);
        assert_eq!(dropped, 1);
        assert_eq!(rest, "");
    }
}
