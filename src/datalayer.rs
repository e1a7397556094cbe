//! Page classification from the analytics `dataLayer` embedded in `<head>` scripts.
//!
//! Sites push a JSON object such as
//! `window['dataLayer'].push({"page_data": {"page_type": "productListing"}});`.
//! The object is located by brace matching rather than string splitting, and
//! anything that isn't valid JSON is reported as `Malformed`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// `dataLayer.push(`, `window.dataLayer.push(` or `window['dataLayer'].push(`
static PUSH_CALL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:window\s*\[\s*['"]dataLayer['"]\s*\]|(?:window\s*\.\s*)?dataLayer)\s*\.\s*push\s*\("#)
        .expect("Invalid dataLayer push regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Found(String),
    NotFound,
    /// A push call mentioning `page_type` was present but could not be parsed.
    Malformed(String),
}

impl Classification {
    pub fn page_type(&self) -> Option<&str> {
        match self {
            Classification::Found(t) => Some(t.as_str()),
            _ => None,
        }
    }
}

/// Classify a page from the text of its head scripts. First hit wins.
pub fn classify_scripts<S: AsRef<str>>(scripts: &[S]) -> Classification {
    let mut last_error: Option<String> = None;

    for script in scripts.iter().map(AsRef::as_ref).filter(|s| s.contains("page_type")) {
        for object in push_arguments(script) {
            match serde_json::from_str::<Value>(object) {
                Ok(value) => {
                    if let Some(page_type) = page_type_of(&value) {
                        return Classification::Found(page_type.to_string());
                    }
                }
                Err(e) => {
                    if object.contains("page_type") {
                        debug!("Unparseable dataLayer object: {}", e);
                        last_error = Some(e.to_string());
                    }
                }
            }
        }
    }

    match last_error {
        Some(error) => Classification::Malformed(error),
        None => Classification::NotFound,
    }
}

fn page_type_of(value: &Value) -> Option<&str> {
    value
        .pointer("/page_data/page_type")
        .and_then(Value::as_str)
        .or_else(|| value.get("page_type").and_then(Value::as_str))
}

/// The object literal passed to each `dataLayer.push(...)` call in `script`.
fn push_arguments(script: &str) -> Vec<&str> {
    PUSH_CALL_REGEX
        .find_iter(script)
        .filter_map(|m| {
            let rest = &script[m.end()..];
            let open = rest.len() - rest.trim_start().len();
            if !rest[open..].starts_with('{') {
                return None;
            }
            let len = balanced_object_len(&rest[open..])?;
            Some(&rest[open..open + len])
        })
        .collect()
}

/// Byte length of the `{...}` object at the start of `s`, honouring quoted strings.
fn balanced_object_len(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        window['dataLayer'] = window['dataLayer'] || [];
        window['dataLayer'].push({"event": "init"});
        window['dataLayer'].push({"page_data": {"page_type": "productListing", "title": "Shop {all}"}});
    "#;

    #[test]
    fn test_finds_nested_page_type() {
        assert_eq!(classify_scripts(&[LISTING]), Classification::Found("productListing".to_string()));
    }

    #[test]
    fn test_accepts_other_push_spellings() {
        let dotted = r#"window.dataLayer.push({ "page_type": "articleListing" });"#;
        let bare = r#"dataLayer.push({"page_data":{"page_type":"article"}})"#;
        assert_eq!(classify_scripts(&[dotted]).page_type(), Some("articleListing"));
        assert_eq!(classify_scripts(&[bare]).page_type(), Some("article"));
    }

    #[test]
    fn test_skips_scripts_without_page_type() {
        let scripts = vec![
            "console.log('hello')".to_string(),
            r#"window.dataLayer.push({"event": "gtm.js"})"#.to_string(),
        ];
        assert_eq!(classify_scripts(&scripts), Classification::NotFound);
    }

    #[test]
    fn test_js_object_literal_is_malformed() {
        let script = "window.dataLayer.push({page_data: {page_type: 'productListing'}});";
        assert!(matches!(classify_scripts(&[script]), Classification::Malformed(_)));
    }

    #[test]
    fn test_unterminated_object_is_not_found() {
        let script = r#"window.dataLayer.push({"page_data": {"page_type": "x""#;
        assert_eq!(classify_scripts(&[script]), Classification::NotFound);
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        assert_eq!(balanced_object_len(r#"{"a": "}{"} trailing"#), Some(11));
        assert_eq!(balanced_object_len(r#"{'a': '\'}'}"#), Some(12));
    }
}
