//! Printable-text detection for length-delimited payloads.

use unicode_general_category::{get_general_category, GeneralCategory};

/// Returns the payload as a string if it is valid UTF-8 made only of
/// printable characters and whitespace.
pub fn printable_text(data: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(data).ok()?;
    text.chars().all(is_printable_or_space).then_some(text)
}

/// Returns true if [`printable_text`] would accept the payload.
pub fn is_printable_text(data: &[u8]) -> bool {
    printable_text(data).is_some()
}

/// Letters, marks, numbers, punctuation, symbols, and the ASCII space count
/// as printable; anything with the Unicode `White_Space` property counts as
/// space.
fn is_printable_or_space(c: char) -> bool {
    use GeneralCategory::*;

    c == ' '
        || c.is_whitespace()
        || matches!(
            get_general_category(c),
            UppercaseLetter
                | LowercaseLetter
                | TitlecaseLetter
                | ModifierLetter
                | OtherLetter
                | NonspacingMark
                | SpacingMark
                | EnclosingMark
                | DecimalNumber
                | LetterNumber
                | OtherNumber
                | ConnectorPunctuation
                | DashPunctuation
                | OpenPunctuation
                | ClosePunctuation
                | InitialPunctuation
                | FinalPunctuation
                | OtherPunctuation
                | MathSymbol
                | CurrencySymbol
                | ModifierSymbol
                | OtherSymbol
        )
}
