//! Identifier sanitising and literal quoting shared by both targets.

use serde_json::Value;

/// Words that cannot be used as bare identifiers in Python or TypeScript.
const RESERVED: &[&str] = &[
    // Python
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "false", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "none", "nonlocal", "not", "or", "pass", "raise", "return", "true", "try", "while",
    "with", "yield",
    // TypeScript
    "any", "boolean", "case", "catch", "const", "debugger", "default", "delete", "do", "enum",
    "export", "extends", "function", "implements", "instanceof", "interface", "let", "new",
    "null", "number", "package", "private", "protected", "public", "static", "string", "super",
    "switch", "symbol", "this", "throw", "type", "typeof", "undefined", "var", "void",
];

/// Turn arbitrary text into an identifier valid in Python and TypeScript.
///
/// Lowercases, maps every run of non-`[a-z0-9]` characters to one `_`, trims
/// underscores, prefixes `_` when the result starts with a digit and
/// suffixes `_` when it is a reserved word. Returns `None` when nothing
/// usable is left.
pub fn sanitize_identifier(raw: &str) -> Option<String> {
    let mut ident = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !ident.is_empty() {
                ident.push('_');
            }
            pending_sep = false;
            ident.push(ch);
        } else {
            pending_sep = true;
        }
    }

    if ident.is_empty() {
        return None;
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if RESERVED.contains(&ident.as_str()) {
        ident.push('_');
    }
    Some(ident)
}

/// `hello_workflow` → `HelloWorkflow`.
///
/// Input should already be sanitized. A leading digit keeps an `_` prefix so
/// the result stays a valid class name. A later part starting with a digit
/// keeps its `_` separator so `x_1a` and `x1a` stay distinct.
pub fn pascal_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    for part in ident.split('_').filter(|part| !part.is_empty()) {
        let mut chars = part.chars();
        let Some(first) = chars.next() else { continue };
        if first.is_ascii_digit() {
            out.push('_');
        }
        out.push(first.to_ascii_uppercase());
        out.push_str(chars.as_str());
    }
    out
}

/// Double-quoted string literal valid in both Python and TypeScript.
pub fn quote(text: &str) -> String {
    Value::String(text.to_owned()).to_string()
}

/// A JSON value as a Python expression.
pub fn python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_owned(),
        Value::Bool(true) => "True".to_owned(),
        Value::Bool(false) => "False".to_owned(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(python_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), python_literal(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

/// A JSON value as a TypeScript expression.
pub fn ts_literal(value: &Value) -> String {
    value.to_string()
}
