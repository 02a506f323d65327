//! SQL error classification and the deterministic rewrite rules used by the
//! fix loop.
//!
//! Classification matches the remote engine's literal error text, so any change
//! in its wording belongs here and in the table test at the bottom of this file.
//! Every rewrite returns `None` when it would leave the SQL unchanged. Running a
//! rule on its own output is therefore a no-op, and the fix loop can stop.

use crate::domain::matching::normalize;
use crate::domain::report::{ErrorCategory, SchemaCatalog};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Table names commonly guessed by an LLM, with the object that actually holds the data.
pub const KNOWN_BAD_OBJECTS: &[(&str, &str)] = &[
    ("TIMETAKEN", "ACTIONS"),
    ("TIMEENTRIES", "ACTIONS"),
    ("TIMESHEETS", "ACTIONS"),
    ("TICKETS", "FAULTS"),
    ("TICKET", "FAULTS"),
    ("AGENTS", "UNAME"),
    ("TECHNICIANS", "UNAME"),
    ("CLIENTS", "AREA"),
    ("CUSTOMERS", "AREA"),
    ("PRIORITIES", "POLICY"),
    ("STATUSES", "TSTATUS"),
    ("TICKETTYPES", "REQUESTTYPE"),
];

pub const KNOWN_BAD_COLUMNS: &[(&str, &str)] = &[
    ("TicketID", "Faultid"),
    ("Ticket_ID", "Faultid"),
    ("Priority", "Seriousness"),
    ("PriorityID", "Seriousness"),
    ("AgentName", "uname"),
    ("AgentID", "Assignedtoint"),
    ("ClientID", "Areaint"),
    ("DateCreated", "dateoccured"),
    ("CreatedDate", "dateoccured"),
    ("DateClosed", "datecleared"),
    ("ClosedDate", "datecleared"),
    ("StatusID", "Status"),
];

/// Real column names that contain whitespace and must be bracket-delimited.
pub const KNOWN_SPACED_IDENTIFIERS: &[&str] = &[
    "Date Occurred",
    "Date Cleared",
    "Request Type",
    "Client Name",
    "Site Name",
    "Time Taken",
];

const ROW_LIMIT_CLAUSE: &str = "TOP 100 PERCENT ";

const SQL_KEYWORDS: &[&str] = &[
    "FROM", "WHERE", "GROUP", "ORDER", "HAVING", "JOIN", "LEFT", "RIGHT", "INNER", "OUTER",
    "CROSS", "FULL", "ON", "UNION", "AND", "OR", "END", "WHEN", "THEN", "ELSE", "AS", "SELECT",
    "INTO", "OFFSET", "DESC", "ASC", "BY", "CASE", "NOT", "IS", "NULL", "IN", "EXCEPT",
    "INTERSECT", "WITH", "OVER", "PARTITION",
];

static QUOTED_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'([^']+)'").expect("quoted name regex"));
static ORDER_BY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bORDER\s+BY\b").expect("order by regex"));
static LEADING_TOP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^TOP\b").expect("top regex"));
static SELECT_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSELECT\s+(?:DISTINCT\s+)?").expect("select regex"));
static AS_KEYWORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bAS\s+").expect("as regex"));
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*").expect("word regex"));
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]]*\]|\b[A-Za-z_][A-Za-z0-9_]*\b").expect("identifier regex")
});
static SPACED_IDENTIFIERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    KNOWN_SPACED_IDENTIFIERS
        .iter()
        .map(|identifier| {
            let words: Vec<String> = identifier.split(' ').map(regex::escape).collect();
            Regex::new(&format!(r"(?i)(^|[^\[\w])({})\b", words.join(r"\s+"))).expect("spaced identifier regex")
        })
        .collect()
});
static OBJECT_POSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(FROM|JOIN)(\s+)((?:\w+\.)?)([A-Za-z_][A-Za-z0-9_]*)\b").expect("object regex")
});

/// A rewritten query and a short description of the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub rule: String,
    pub sql: String,
}

/// Classify a remote SQL error. `sql` is consulted for known-bad identifiers when
/// the error text alone is not conclusive.
pub fn classify_error(error: &str, sql: &str) -> ErrorCategory {
    let text = error.to_ascii_lowercase();

    if text.contains("invalid object name")
        || (text.contains("object") && text.contains("does not exist"))
    {
        return ErrorCategory::UnknownObject;
    }
    if text.contains("invalid column name") || text.contains("unknown column") {
        return ErrorCategory::UnknownColumn;
    }
    if text.contains("order by clause is invalid")
        || (text.contains("order by") && text.contains("unless top"))
    {
        return ErrorCategory::MissingTopWithOrderBy;
    }
    if text.contains("incorrect syntax near") && !unquoted_identifier_spans(sql).is_empty() {
        return ErrorCategory::UnquotedIdentifier;
    }
    if !known_bad_objects_in(sql).is_empty() {
        return ErrorCategory::UnknownObject;
    }

    ErrorCategory::Unclassified
}

/// Apply the single rewrite rule registered for `category`.
pub fn apply_fix(
    category: ErrorCategory,
    sql: &str,
    error: &str,
    schema: Option<&SchemaCatalog>,
) -> Option<Rewrite> {
    match category {
        ErrorCategory::UnknownObject => replace_unknown_objects(sql, error, schema),
        ErrorCategory::UnknownColumn => replace_unknown_column(sql, error, schema),
        ErrorCategory::MissingTopWithOrderBy => insert_row_limit(sql),
        ErrorCategory::UnquotedIdentifier => quote_spaced_identifiers(sql),
        ErrorCategory::Unclassified => None,
    }
}

/// First single-quoted name in an engine error, without any schema prefix.
pub fn quoted_name(error: &str) -> Option<String> {
    let name = QUOTED_NAME.captures(error)?.get(1)?.as_str();
    let name = name.rsplit('.').next().unwrap_or(name);
    let name = name.trim_matches(|c| c == '[' || c == ']');
    (!name.is_empty()).then(|| name.to_string())
}

fn known_bad_object(name: &str) -> Option<&'static str> {
    KNOWN_BAD_OBJECTS
        .iter()
        .find(|(bad, _)| bad.eq_ignore_ascii_case(name))
        .map(|(_, good)| *good)
}

fn known_bad_column(name: &str) -> Option<&'static str> {
    KNOWN_BAD_COLUMNS
        .iter()
        .find(|(bad, _)| bad.eq_ignore_ascii_case(name))
        .map(|(_, good)| *good)
}

/// Known-bad object names referenced after FROM or JOIN.
fn known_bad_objects_in(sql: &str) -> Vec<String> {
    OBJECT_POSITION
        .captures_iter(sql)
        .filter_map(|caps| {
            let name = caps.get(4)?.as_str();
            known_bad_object(name).map(|_| name.to_string())
        })
        .collect()
}

/// Compare ignoring case, separators and a trailing plural "s".
fn closest_schema_name<'a>(bad: &str, candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let key = |s: &str| {
        let n = normalize(s).replace(' ', "");
        n.strip_suffix('s').map(str::to_string).unwrap_or(n)
    };
    let wanted = key(bad);
    candidates
        .into_iter()
        .find(|c| !c.eq_ignore_ascii_case(bad) && key(c) == wanted)
}

fn replace_unknown_objects(sql: &str, error: &str, schema: Option<&SchemaCatalog>) -> Option<Rewrite> {
    let mut targets: Vec<String> = match quoted_name(error) {
        Some(name) => vec![name],
        None => known_bad_objects_in(sql),
    };
    targets.dedup_by(|a, b| a.eq_ignore_ascii_case(b));

    let mut replacements = Vec::new();
    for bad in &targets {
        let good = known_bad_object(bad).map(str::to_string).or_else(|| {
            let schema = schema.filter(|s| !s.has_object(bad))?;
            closest_schema_name(bad, schema.objects.iter().map(|o| o.name.as_str())).map(str::to_string)
        });
        if let Some(good) = good {
            replacements.push((bad.clone(), good));
        }
    }

    let mut rewritten = sql.to_string();
    let mut applied = Vec::new();
    for (bad, good) in &replacements {
        let next = OBJECT_POSITION
            .replace_all(&rewritten, |caps: &Captures| {
                if caps[4].eq_ignore_ascii_case(bad) {
                    format!("{}{}{}{}", &caps[1], &caps[2], &caps[3], good)
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned();
        if next != rewritten {
            applied.push(format!("{} -> {}", bad, good));
            rewritten = next;
        }
    }

    if applied.is_empty() {
        return None;
    }
    Some(Rewrite {
        rule: format!("replace unknown object: {}", applied.join(", ")),
        sql: rewritten,
    })
}

fn replace_unknown_column(sql: &str, error: &str, schema: Option<&SchemaCatalog>) -> Option<Rewrite> {
    let bad = quoted_name(error)?;
    let good = known_bad_column(&bad).map(str::to_string).or_else(|| {
        let schema = schema?;
        closest_schema_name(&bad, schema.columns()).map(str::to_string)
    })?;

    let rewritten = IDENTIFIER
        .replace_all(sql, |caps: &Captures| {
            let token = &caps[0];
            match token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                Some(inner) if inner.eq_ignore_ascii_case(&bad) => format!("[{}]", good),
                None if token.eq_ignore_ascii_case(&bad) => good.clone(),
                _ => token.to_string(),
            }
        })
        .into_owned();
    if rewritten == sql {
        return None;
    }
    Some(Rewrite {
        rule: format!("replace unknown column: {} -> {}", bad, good),
        sql: rewritten,
    })
}

/// Parenthesis group of every byte, `None` inside string literals and
/// bracketed identifiers. Group 0 is the top level.
fn paren_groups(sql: &str) -> Vec<Option<usize>> {
    let mut groups = Vec::with_capacity(sql.len());
    let mut stack = vec![0usize];
    let mut next = 1;
    let mut quoted = false;
    let mut bracketed = false;
    for b in sql.bytes() {
        if quoted || bracketed {
            groups.push(None);
            match b {
                b'\'' if quoted => quoted = false,
                b']' if bracketed => bracketed = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'\'' => {
                quoted = true;
                groups.push(None);
            }
            b'[' => {
                bracketed = true;
                groups.push(None);
            }
            b'(' => {
                groups.push(stack.last().copied());
                stack.push(next);
                next += 1;
            }
            b')' => {
                if stack.len() > 1 {
                    stack.pop();
                }
                groups.push(stack.last().copied());
            }
            _ => groups.push(stack.last().copied()),
        }
    }
    groups
}

/// Insert a row-limit clause into each SELECT that owns an ORDER BY and has
/// no TOP of its own. The owner is the nearest preceding SELECT at the same
/// parenthesis depth, so CTEs and subqueries are handled; an ORDER BY with no
/// owner (a window's `OVER (ORDER BY ..)`) is left alone.
pub fn insert_row_limit(sql: &str) -> Option<Rewrite> {
    let groups = paren_groups(sql);
    let group_at = |pos: usize| groups.get(pos).copied().flatten();
    let heads: Vec<(usize, usize, usize)> = SELECT_HEAD
        .find_iter(sql)
        .filter_map(|m| Some((group_at(m.start())?, m.start(), m.end())))
        .collect();

    let mut insert_at: Vec<usize> = ORDER_BY
        .find_iter(sql)
        .filter_map(|order| {
            let group = group_at(order.start())?;
            heads
                .iter()
                .rev()
                .find(|(g, start, _)| *g == group && *start < order.start())
                .map(|(_, _, end)| *end)
        })
        .filter(|end| !LEADING_TOP.is_match(&sql[*end..]))
        .collect();
    insert_at.sort_unstable();
    insert_at.dedup();
    if insert_at.is_empty() {
        return None;
    }

    let mut rewritten = sql.to_string();
    for pos in insert_at.into_iter().rev() {
        rewritten.insert_str(pos, ROW_LIMIT_CLAUSE);
    }
    Some(Rewrite {
        rule: "insert TOP before ORDER BY".to_string(),
        sql: rewritten,
    })
}

fn is_keyword(word: &str) -> bool {
    SQL_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

/// Byte spans of multi-word aliases following `AS` that are not delimited.
fn unquoted_identifier_spans(sql: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    for m in AS_KEYWORD.find_iter(sql) {
        let mut pos = m.end();
        let start = pos;
        let mut end = pos;
        let mut words = 0;
        loop {
            let Some(word) = WORD.find(&sql[pos..]) else { break };
            if is_keyword(word.as_str()) {
                break;
            }
            words += 1;
            end = pos + word.end();
            let rest = &sql[end..];
            let gap = rest.len() - rest.trim_start_matches([' ', '\t']).len();
            if gap == 0 {
                break;
            }
            pos = end + gap;
        }
        if words >= 2 {
            spans.push((start, end));
        }
    }
    spans
}

pub fn quote_spaced_identifiers(sql: &str) -> Option<Rewrite> {
    let mut rewritten = sql.to_string();
    for (start, end) in unquoted_identifier_spans(sql).into_iter().rev() {
        let alias = sql[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
        rewritten.replace_range(start..end, &format!("[{}]", alias));
    }

    for re in SPACED_IDENTIFIERS.iter() {
        rewritten = re
            .replace_all(&rewritten, |caps: &Captures| format!("{}[{}]", &caps[1], &caps[2]))
            .into_owned();
    }

    if rewritten == sql {
        return None;
    }
    Some(Rewrite {
        rule: "bracket-quote identifiers containing spaces".to_string(),
        sql: rewritten,
    })
}
