//! Canonical call signatures used as dedup keys throughout the dispatcher.

use serde_json::Value;

/// Canonicalize a parameter value into a stable string: object keys sorted
/// recursively so that two mappings differing only in key insertion order
/// produce identical output.
pub fn canonical(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Dedup key: tool name concatenated with the canonical form of its parameters.
pub fn signature(tool_name: &str, parameters: &Value) -> String {
    format!("{tool_name}{}", canonical(parameters))
}

/// Levenshtein edit distance, used to suggest a registered tool name when an
/// unknown one is requested.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];

    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

/// Names within edit distance 3 of `target`, closest first.
pub fn suggest(target: &str, candidates: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    const MAX_DISTANCE: usize = 3;
    let mut scored: Vec<(usize, String)> = candidates
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .map(|c| (levenshtein(target, &c), c))
        .filter(|(dist, _)| *dist <= MAX_DISTANCE)
        .collect();
    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    scored.into_iter().map(|(_, name)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_ignores_key_order() {
        let a = json!({"path": "x", "operation": "write"});
        let b = json!({"operation": "write", "path": "x"});
        assert_eq!(canonical(&a), canonical(&b));
    }

    #[test]
    fn canonical_recurses_into_nested_objects() {
        let a = json!({"outer": {"b": 1, "a": 2}});
        let b = json!({"outer": {"a": 2, "b": 1}});
        assert_eq!(canonical(&a), canonical(&b));
    }

    #[test]
    fn signature_combines_name_and_parameters() {
        let sig = signature("filesystem", &json!({"operation": "list"}));
        assert!(sig.starts_with("filesystem"));
    }

    #[test]
    fn levenshtein_distance_matches_known_values() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("filesystem", "filesystem"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn suggest_filters_beyond_max_distance() {
        let candidates = ["filesystem", "execution", "search", "planning"];
        let suggestions = suggest("flesystem", candidates);
        assert_eq!(suggestions, vec!["filesystem".to_string()]);
    }
}
