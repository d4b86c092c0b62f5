use crate::domain::model::{RegisterRange, NOT_AVAILABLE};
use serde_json::Value;

/// Normalizes the subject matter of an upstream thesis into one display string.
///
/// The repository has shipped `materias`/`materia` as a plain string, a list of
/// strings, a `{clave, descripcion}` object, or a list of such objects.
pub fn extract_materia(data: &Value) -> String {
    let materia = [data.get("materias"), data.get("materia")]
        .into_iter()
        .flatten()
        .find(|v| is_present(v));

    let Some(materia) = materia else {
        return NOT_AVAILABLE.to_string();
    };

    match materia {
        Value::String(s) => s.clone(),
        Value::Object(_) => describe_object(materia),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) if items.iter().all(Value::is_object) => items
            .iter()
            .map(describe_object)
            .collect::<Vec<_>>()
            .join(", "),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

fn describe_object(value: &Value) -> String {
    ["descripcion", "clave"]
        .into_iter()
        .filter_map(|key| value.get(key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

/// Sorts ranges and coalesces overlapping or adjacent ones, dropping empties.
pub fn merge_ranges(ranges: &[RegisterRange]) -> Vec<RegisterRange> {
    let mut sorted: Vec<RegisterRange> = ranges.iter().copied().filter(|r| !r.is_empty()).collect();
    sorted.sort();

    let mut merged: Vec<RegisterRange> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

pub fn embedding_text(rubro: &str, texto: &str) -> String {
    format!("{} {}", rubro, texto)
}

/// Prefix of at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_materia_plain_string() {
        assert_eq!(extract_materia(&json!({"materia": "Penal"})), "Penal");
    }

    #[test]
    fn test_materias_takes_precedence() {
        let data = json!({"materias": ["Civil", "Común"], "materia": "Penal"});
        assert_eq!(extract_materia(&data), "Civil, Común");
    }

    #[test]
    fn test_empty_materias_falls_back_to_materia() {
        let data = json!({"materias": [], "materia": "Laboral"});
        assert_eq!(extract_materia(&data), "Laboral");
    }

    #[test]
    fn test_materia_object_prefers_descripcion() {
        let data = json!({"materia": {"clave": "ADM", "descripcion": "Administrativa"}});
        assert_eq!(extract_materia(&data), "Administrativa");

        let data = json!({"materia": {"clave": "ADM"}});
        assert_eq!(extract_materia(&data), "ADM");

        let data = json!({"materia": {"otro": 1}});
        assert_eq!(extract_materia(&data), "N/A");
    }

    #[test]
    fn test_materia_list_of_objects() {
        let data = json!({"materias": [
            {"descripcion": "Constitucional"},
            {"clave": "FIS"},
            {}
        ]});
        assert_eq!(extract_materia(&data), "Constitucional, FIS, N/A");
    }

    #[test]
    fn test_materia_missing_or_mixed() {
        assert_eq!(extract_materia(&json!({})), "N/A");
        assert_eq!(extract_materia(&json!({"materia": null})), "N/A");
        assert_eq!(extract_materia(&json!({"materias": ["Civil", {"clave": "X"}]})), "N/A");
        assert_eq!(extract_materia(&json!({"materia": 42})), "N/A");
    }

    #[test]
    fn test_merge_ranges_coalesces_overlaps_and_adjacency() {
        let ranges = [
            RegisterRange::new(207000, 2023000),
            RegisterRange::new(292564, 350000),
            RegisterRange::new(161000, 206000),
            RegisterRange::new(206000, 207000),
            RegisterRange::new(10, 10),
            RegisterRange::new(2028000, 2031780),
        ];
        assert_eq!(
            merge_ranges(&ranges),
            vec![
                RegisterRange::new(161000, 2023000),
                RegisterRange::new(2028000, 2031780),
            ]
        );
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("ÉPOCA", 3), "ÉPO");
        assert_eq!(truncate_chars("abc", 80), "abc");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_embedding_text() {
        assert_eq!(embedding_text("RUBRO", "texto"), "RUBRO texto");
    }
}
