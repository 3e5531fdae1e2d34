//! Emoji receipt records

mod store;

pub use store::{NewReceipt, Receipt, ReceiptStore};

/// Joiners and modifiers that combine with a base emoji rather than
/// counting as a symbol of their own.
fn is_combining(c: char) -> bool {
    matches!(c, '\u{fe0f}' | '\u{200d}' | '\u{1f3fb}'..='\u{1f3ff}')
}

/// Number of visible symbols in an emoji code
pub fn symbol_count(code: &str) -> usize {
    let mut count = 0;
    let mut after_joiner = false;
    for c in code.chars() {
        if c == '\u{200d}' {
            after_joiner = true;
            continue;
        }
        if is_combining(c) || after_joiner {
            after_joiner = false;
            continue;
        }
        count += 1;
    }
    count
}

/// A receipt code is exactly four emoji symbols
pub fn validate_code(code: &str) -> bool {
    if code.is_empty() || code.chars().any(|c| c.is_ascii()) {
        return false;
    }
    symbol_count(code) == 4
}
