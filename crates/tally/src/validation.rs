//! Validation logic for label and metric names.

const fn is_valid_metric_start_char(ch: u8) -> bool {
    ch == b'_' || ch == b':' || ch.is_ascii_alphabetic()
}

const fn is_valid_metric_char(ch: u8) -> bool {
    is_valid_metric_start_char(ch) || ch.is_ascii_digit()
}

const fn is_valid_label_start_char(ch: u8) -> bool {
    ch == b'_' || ch.is_ascii_alphabetic()
}

const fn is_valid_label_char(ch: u8) -> bool {
    is_valid_label_start_char(ch) || ch.is_ascii_digit()
}

fn validate_name(
    name: &str,
    is_start_char: fn(u8) -> bool,
    is_char: fn(u8) -> bool,
) -> Result<(), &'static str> {
    let Some((&first, rest)) = name.as_bytes().split_first() else {
        return Err("name cannot be empty");
    };
    if !name.is_ascii() {
        return Err("name contains non-ASCII chars");
    }
    if !is_start_char(first) {
        return Err("name starts with a disallowed char");
    }
    if !rest.iter().copied().all(is_char) {
        return Err("name contains a disallowed char");
    }
    Ok(())
}

/// Checks that a metric name matches `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub(crate) fn validate_metric_name(name: &str) -> Result<(), &'static str> {
    validate_name(name, is_valid_metric_start_char, is_valid_metric_char)
}

/// Checks that a label name matches `[a-zA-Z_][a-zA-Z0-9_]*` and is not reserved.
pub(crate) fn validate_label_name(name: &str) -> Result<(), &'static str> {
    validate_name(name, is_valid_label_start_char, is_valid_label_char)?;
    if name.starts_with("__") {
        return Err("label names starting with `__` are reserved");
    }
    Ok(())
}
