use once_cell::sync::Lazy;
use regex::Regex;

/// Sentinel rule ID meaning "suppress every rule for this statement".
pub const SUPPRESS_ALL: &str = "*";

static IGNORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*--\s*pgfence-ignore(?::[ \t]*([^\n]+))?\s*$").expect("ignore regex")
});

static LEGACY_IGNORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*--\s*pgfence:\s*ignore[ \t]+([^\n]+)\s*$").expect("legacy regex"));

/// Scan a region of SQL text for suppression directives.
///
/// Two comment forms are recognised, case-insensitively:
/// `-- pgfence-ignore` suppresses everything; `-- pgfence-ignore: a, b` and
/// the legacy `-- pgfence: ignore a, b` suppress the listed rule IDs. All
/// directives found in the region are merged; the bare form wins.
pub fn find_suppressions(region: &str) -> Option<Vec<String>> {
    let mut ids: Vec<String> = Vec::new();
    let mut any = false;
    for cap in IGNORE_RE.captures_iter(region) {
        any = true;
        match cap.get(1) {
            None => return Some(vec![SUPPRESS_ALL.to_string()]),
            Some(list) => collect_ids(list.as_str(), &mut ids),
        }
    }
    for cap in LEGACY_IGNORE_RE.captures_iter(region) {
        any = true;
        if let Some(list) = cap.get(1) {
            collect_ids(list.as_str(), &mut ids);
        }
    }
    if any {
        Some(ids)
    } else {
        None
    }
}

fn collect_ids(list: &str, ids: &mut Vec<String>) {
    for id in list.split(',') {
        let id = id.trim();
        if !id.is_empty() && !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
}

/// True if `suppressed` (from a [find_suppressions] call) silences `rule_id`.
pub fn suppresses(suppressed: Option<&[String]>, rule_id: &str) -> bool {
    match suppressed {
        None => false,
        Some(ids) => ids
            .iter()
            .any(|id| id == SUPPRESS_ALL || id == rule_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_directive() {
        assert_eq!(find_suppressions("SELECT 1;"), None);
    }

    #[test]
    fn bare_ignore_suppresses_all() {
        let found = find_suppressions("-- pgfence-ignore\nDROP TABLE old_data;").unwrap();
        assert_eq!(found, vec![SUPPRESS_ALL.to_string()]);
        assert!(suppresses(Some(&found), "drop-table"));
        assert!(suppresses(Some(&found), "anything-else"));
    }

    #[test]
    fn listed_ids_only() {
        let found =
            find_suppressions("-- pgfence-ignore: drop-table, truncate\nDROP TABLE t;").unwrap();
        assert_eq!(found, vec!["drop-table".to_string(), "truncate".to_string()]);
        assert!(suppresses(Some(&found), "drop-table"));
        assert!(!suppresses(Some(&found), "rename-table"));
    }

    #[test]
    fn legacy_form() {
        let found = find_suppressions("-- pgfence: ignore drop-table\nDROP TABLE t;").unwrap();
        assert_eq!(found, vec!["drop-table".to_string()]);
    }

    #[test]
    fn case_insensitive() {
        let found = find_suppressions("-- PGFENCE-IGNORE: Drop-Table\nDROP TABLE t;").unwrap();
        assert_eq!(found, vec!["Drop-Table".to_string()]);
        let all = find_suppressions("-- PgFence-Ignore\nDROP TABLE t;").unwrap();
        assert_eq!(all, vec![SUPPRESS_ALL.to_string()]);
    }

    #[test]
    fn multiple_directives_merge() {
        let region = "-- pgfence-ignore: a\n-- pgfence: ignore b, c\n";
        let found = find_suppressions(region).unwrap();
        assert_eq!(
            found,
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn unrelated_comments_are_not_directives() {
        assert_eq!(find_suppressions("-- drop the stale rows first\n"), None);
        assert_eq!(find_suppressions("-- pgfenced off\n"), None);
    }
}
