//! Approximate text metrics shared by the composer and the PDF encoder.
//!
//! Widths are estimated per character class rather than read from font
//! files, so the same content always measures the same.

use crate::model::BlockKind;

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT: f32 = 1.25;

/// Space after each block as a multiple of the font size.
pub const BLOCK_SPACING: f32 = 0.6;

/// Gap between the two columns of a side-by-side row, in points.
pub const COLUMN_GAP: f32 = 14.0;

/// Indent per list nesting level, in points.
pub const LIST_INDENT: f32 = 18.0;

/// Font size multiplier for a block kind.
pub fn font_scale(kind: BlockKind) -> f32 {
    match kind.heading_level() {
        Some(1) => 1.8,
        Some(2) => 1.5,
        Some(3) => 1.3,
        Some(4) => 1.15,
        Some(_) => 1.05,
        None => 1.0,
    }
}

/// Estimated advance width of a character as a fraction of the font size.
pub fn char_width(c: char) -> f32 {
    match c {
        ' ' => 0.28,
        'i' | 'j' | 'l' | '.' | ',' | ';' | ':' | '\'' | '!' | '|' => 0.28,
        'm' | 'w' | 'M' | 'W' => 0.8,
        'A'..='Z' => 0.66,
        '\u{0600}'..='\u{06FF}' | '\u{0590}'..='\u{05FF}' => 0.45,
        '\u{1100}'..='\u{11FF}'
        | '\u{2E80}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF00}'..='\u{FFEF}' => 1.0,
        _ => 0.5,
    }
}

/// Estimated width of a string in points.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().map(char_width).sum::<f32>() * size
}

/// Greedy word wrap to `width` points.
///
/// Words wider than a line are broken between characters. Always returns
/// at least one line.
pub fn wrap_lines(text: &str, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0f32;
    let space = char_width(' ') * size;

    for word in text.split_whitespace() {
        let word_width = text_width(word, size);
        let needed = if current.is_empty() {
            word_width
        } else {
            current_width + space + word_width
        };
        if needed <= width {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_width = needed;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }
        if word_width <= width {
            current.push_str(word);
            current_width = word_width;
            continue;
        }
        for c in word.chars() {
            let w = char_width(c) * size;
            if current_width + w > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0.0;
            }
            current.push(c);
            current_width += w;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Height of a text block of `kind` at base size `size` within `width`.
pub fn text_block_height(text: &str, kind: BlockKind, size: f32, width: f32) -> f32 {
    let size = size * font_scale(kind);
    let lines = wrap_lines(text, size, width).len() as f32;
    lines * size * LINE_HEIGHT + size * BLOCK_SPACING
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_width() {
        let text = "the quick brown fox jumps over the lazy dog ".repeat(10);
        let lines = wrap_lines(&text, 12.0, 200.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| text_width(l, 12.0) <= 200.0 + 1e-3));
        assert_eq!(lines.join(" "), text.trim_end());
    }

    #[test]
    fn test_long_word_broken() {
        let lines = wrap_lines(&"x".repeat(100), 10.0, 50.0);
        assert_eq!(lines.len(), 10);
        assert!(lines.iter().all(|l| l.len() == 10));
    }

    #[test]
    fn test_empty_text_one_line() {
        assert_eq!(wrap_lines("", 12.0, 100.0), vec![String::new()]);
    }

    #[test]
    fn test_heading_taller_than_paragraph() {
        let p = text_block_height("Title", BlockKind::Paragraph, 12.0, 400.0);
        let h = text_block_height("Title", BlockKind::heading(1), 12.0, 400.0);
        assert!(h > p);
        assert!((p - 12.0 * (LINE_HEIGHT + BLOCK_SPACING)).abs() < 1e-4);
    }

    #[test]
    fn test_cjk_wider_than_latin() {
        assert!(text_width("漢字", 10.0) > text_width("ab", 10.0));
    }
}
