// Parsing helpers for tabular command output
use regex::Regex;
use std::collections::HashMap;

/// A parsed table cell: numeric when it looks like a number
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(_) => None,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // 42.0 prints as 42, like the tools that produced it
            Cell::Number(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

pub type Row = HashMap<String, Cell>;

/// Zip each non-empty line's whitespace-separated fields with `header`
///
/// Extra fields are dropped, missing ones are absent from the row.
pub fn parse_table<S: AsRef<str>>(header: &[S], lines: &[&str]) -> Vec<Row> {
    lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            header
                .iter()
                .zip(line.split_whitespace())
                .map(|(key, value)| (key.as_ref().to_string(), Cell::parse(value)))
                .collect()
        })
        .collect()
}

/// First capture group of each named pattern that matches `line`
pub fn extract_fields(fields: &[(&str, &Regex)], line: &str) -> Row {
    fields
        .iter()
        .filter_map(|(key, re)| {
            re.captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| (key.to_string(), Cell::parse(m.as_str())))
        })
        .collect()
}

/// Validity constraint on a table cell
#[derive(Debug, Clone, Default)]
pub struct Bound {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub equal: Option<f64>,
    pub contains: Option<String>,
}

impl Bound {
    pub fn min(min: f64) -> Self {
        Self {
            min: Some(min),
            ..Self::default()
        }
    }

    pub fn max(max: f64) -> Self {
        Self {
            max: Some(max),
            ..Self::default()
        }
    }

    /// True if `cell` satisfies every configured constraint
    ///
    /// Text cells never satisfy a numeric constraint.
    pub fn check(&self, cell: &Cell) -> bool {
        let numeric = self.min.is_some() || self.max.is_some() || self.equal.is_some();
        let value = cell.as_number();

        if numeric && value.is_none() {
            return false;
        }
        if let Some(value) = value {
            if self.min.is_some_and(|min| value < min)
                || self.max.is_some_and(|max| value > max)
                || self.equal.is_some_and(|eq| value != eq)
            {
                return false;
            }
        }
        if let Some(needle) = &self.contains {
            return cell.to_string().contains(needle.as_str());
        }
        true
    }
}
