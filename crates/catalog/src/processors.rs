// Custom output processors for probes that need more than patterns
//
// Each processor maps decoded stdout to failure reasons; an empty list
// means the output is healthy.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::table::{extract_fields, parse_table, Bound, Cell, Row};

/// Fail above 95% of the limit in a `current\nmax` pair
pub const CURRENT_MAX_LIMIT: f64 = 0.95;
pub const MEMORY_LIMIT: f64 = 0.90;
pub const SWAP_LIMIT: f64 = 0.25;
/// Used when `sensors` reports neither a high nor a crit threshold
pub const DEFAULT_TEMP_LIMIT: f64 = 105.0;

static FIRST_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("valid regex"));
static TEMPERATURE_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d\s*°?C\b").expect("valid regex"));
static TEMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^:+\n]*:.*?([\d.]+)").expect("valid regex"));
static HIGH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(.*high\s*=\s*\+?([\d.]+)").expect("valid regex"));
static CRIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(.*crit\s*=\s*\+?([\d.]+)").expect("valid regex"));

/// SMART attribute -> (column, constraint)
static SMART_LIMITS: Lazy<Vec<(&'static str, &'static str, Bound)>> = Lazy::new(|| {
    vec![
        ("Media_Wearout_Indicator", "VALUE", Bound::min(10.0)),
        ("Current_Pending_Sector", "RAW_VALUE", Bound::max(20.0)),
    ]
});

fn first_integer(line: &str) -> Option<u64> {
    FIRST_INTEGER
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Processor for commands printing `current\nmax` (file descriptors, threads)
///
/// An `unlimited` maximum never fails.
pub fn current_max(label: &'static str) -> impl Fn(&str) -> Vec<String> + Send + Sync + 'static {
    move |stdout: &str| {
        let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
        let [current, max] = lines.as_slice() else {
            return vec![format!("expected current and max {} counts, got {:?}", label, stdout)];
        };

        if max.trim() == "unlimited" {
            return Vec::new();
        }

        match (first_integer(current), first_integer(max)) {
            (Some(current), Some(max)) if max > 0 => {
                if current as f64 / max as f64 > CURRENT_MAX_LIMIT {
                    vec![format!("{} usage > 95%", label)]
                } else {
                    Vec::new()
                }
            }
            _ => vec![format!("unparseable {} counts: {:?}", label, stdout)],
        }
    }
}

fn usage(row: &Row) -> Option<(f64, f64)> {
    let used = row.get("used").and_then(Cell::as_number)?;
    let total = row.get("total").and_then(Cell::as_number)?;
    Some((used, total))
}

/// `free -m` processing: memory above 90%, swap above 25%
pub fn free_memory(stdout: &str) -> Vec<String> {
    let lines: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < 2 {
        return vec![format!("unexpected free output: {:?}", stdout)];
    }

    let mut header = vec!["type".to_string()];
    header.extend(lines[0].split_whitespace().take(3).map(str::to_lowercase));
    let rows = parse_table(&header, &lines[1..]);
    let row = |prefix: &str| {
        rows.iter().find(|row| {
            matches!(row.get("type"), Some(Cell::Text(t)) if t.starts_with(prefix))
        })
    };

    let mut failures = Vec::new();

    match row("Mem").and_then(usage) {
        Some((used, total)) if total > 0.0 => {
            if used / total > MEMORY_LIMIT {
                failures.push("mem usage > 90%".to_string());
            }
        }
        _ => failures.push(format!("no memory totals in free output: {:?}", lines[1])),
    }

    if let Some((used, total)) = row("Swap").and_then(usage) {
        if total > 0.0 && used / total > SWAP_LIMIT {
            failures.push("swap usage > 25%".to_string());
        }
    }

    failures
}

/// `sensors` processing: every temperature line above its high/crit limit
pub fn temperatures(stdout: &str) -> Vec<String> {
    let fields = [("temp", &*TEMP), ("high", &*HIGH), ("crit", &*CRIT)];

    stdout
        .lines()
        .filter(|line| TEMPERATURE_UNIT.is_match(line))
        .filter_map(|line| {
            let row = extract_fields(&fields, line);
            let temp = row
                .get("temp")
                .and_then(Cell::as_number)
                .filter(|t| *t != 0.0)?;
            let limit = ["high", "crit"]
                .iter()
                .filter_map(|key| row.get(*key).and_then(Cell::as_number))
                .filter(|v| *v != 0.0)
                .reduce(f64::min)
                .unwrap_or(DEFAULT_TEMP_LIMIT);

            (temp > limit).then(|| line.trim().to_string())
        })
        .collect()
}

/// `smartctl -A` processing: wear indicator and pending sectors
pub fn smart_attributes(stdout: &str) -> Vec<String> {
    let lines: Vec<&str> = stdout.lines().collect();
    let Some(header_at) = lines.iter().position(|l| l.contains("ID#")) else {
        return vec!["no SMART attribute table found".to_string()];
    };

    let header: Vec<&str> = lines[header_at].split_whitespace().collect();
    let rows = parse_table(&header, &lines[header_at + 1..]);

    let mut failures = Vec::new();
    for row in &rows {
        let Some(name) = row.get("ATTRIBUTE_NAME").map(Cell::to_string) else {
            continue;
        };
        for (attribute, column, bound) in SMART_LIMITS.iter() {
            if name != *attribute {
                continue;
            }
            if let Some(cell) = row.get(*column) {
                if !bound.check(cell) {
                    failures.push(format!("{} {}", name, cell));
                }
            }
        }
    }
    failures
}
