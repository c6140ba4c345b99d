//! Property-list helpers shared by the frame reader and the IPC dispatcher.
//!
//! Both wire formats are plists (`(:key value :key value ...)`).  Keys may
//! come back from `lexpr` either as `Value::Keyword("key")` or as
//! `Value::Symbol(":key")` depending on parser options, so every lookup
//! accepts both forms.

use lexpr::Value;

/// Find the raw value that follows `:key` in a plist.
pub fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let prefixed = format!(":{}", key);
    let mut current = value;
    while let Value::Cons(pair) = current {
        let is_key = match pair.car() {
            Value::Keyword(k) => k.as_ref() == key,
            Value::Symbol(s) => s.as_ref() == prefixed,
            _ => false,
        };
        if is_key {
            return match pair.cdr() {
                Value::Cons(next) => Some(next.car()),
                _ => None,
            };
        }
        current = pair.cdr();
    }
    None
}

/// Extract a plist value rendered as a plain string.
pub fn get_keyword(value: &Value, key: &str) -> Option<String> {
    get_value(value, key).map(atom_to_string)
}

/// Extract an integer value from a plist.
pub fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a string value from a plist.
pub fn get_string(value: &Value, key: &str) -> Option<String> {
    get_keyword(value, key)
}

/// Extract a boolean value from a plist.
/// Treats "t" as true, "nil" as false.
pub fn get_bool(value: &Value, key: &str) -> Option<bool> {
    get_keyword(value, key).map(|s| s != "nil")
}

/// Extract a floating-point value from a plist.
pub fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Render an atom without keyword prefixes or string quotes.
pub fn atom_to_string(val: &Value) -> String {
    match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s = v.to_string();
            s.strip_prefix(':').unwrap_or(&s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "t" } else { "nil" }.to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        _ => val.to_string(),
    }
}

/// Parse a numeric atom.
pub fn as_number(val: &Value) -> Option<f64> {
    match val {
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

/// Whether a value denotes an empty list (`()` or `nil`).
pub fn is_empty_list(val: &Value) -> bool {
    match val {
        Value::Null | Value::Nil => true,
        Value::Symbol(s) => s.as_ref() == "nil",
        Value::Bool(b) => !*b,
        _ => false,
    }
}

/// Collect the top-level elements of a proper list.
///
/// Returns `None` for atoms other than the empty list, and for improper
/// (dotted) lists.
pub fn list_items(val: &Value) -> Option<Vec<&Value>> {
    if is_empty_list(val) {
        return Some(Vec::new());
    }
    let mut items = Vec::new();
    let mut current = val;
    loop {
        match current {
            Value::Cons(pair) => {
                items.push(pair.car());
                current = pair.cdr();
            }
            other if is_empty_list(other) => return Some(items),
            _ => return None,
        }
    }
}

/// Escape a string for s-expression output.
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Lisp-style boolean.
pub fn t_or_nil(b: bool) -> &'static str {
    if b {
        "t"
    } else {
        "nil"
    }
}

/// Format an event s-expression.
pub fn format_event(event_type: &str, fields: &[(&str, &str)]) -> String {
    let mut s = format!("(:type :event :event :{}", event_type);
    for (key, val) in fields {
        s.push_str(&format!(" :{} {}", key, val));
    }
    s.push(')');
    s
}
