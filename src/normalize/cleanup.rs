//! Text cleanup applied to every text run.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const LIGATURES: &[(char, &str)] = &[
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
    ('\u{FB05}', "st"),
    ('\u{FB06}', "st"),
];

/// Cleanup preset levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPreset {
    /// Unicode NFC and whitespace only
    Minimal,
    /// Minimal plus ligature, soft hyphen and replacement-character repair
    #[default]
    Standard,
    /// Standard plus removal of private-use characters and bullet unification
    Aggressive,
}

/// Options for text cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupOptions {
    /// Normalize Unicode to NFC form
    pub normalize_unicode: bool,

    /// Replace presentation-form ligatures (ﬁ, ﬂ, ...) with letters
    pub fix_ligatures: bool,

    /// Remove soft hyphens (U+00AD)
    pub remove_soft_hyphens: bool,

    /// Remove the Unicode replacement character (U+FFFD)
    pub remove_replacement_char: bool,

    /// Remove Private Use Area characters
    pub remove_pua: bool,

    /// Standardize bullet characters (●, ○, ■ → •)
    pub standardize_bullets: bool,

    /// Collapse whitespace runs (including newlines) into one space
    pub collapse_whitespace: bool,
}

impl CleanupOptions {
    /// Create options from a preset.
    pub fn from_preset(preset: CleanupPreset) -> Self {
        let minimal = Self {
            normalize_unicode: true,
            fix_ligatures: false,
            remove_soft_hyphens: false,
            remove_replacement_char: false,
            remove_pua: false,
            standardize_bullets: false,
            collapse_whitespace: true,
        };
        match preset {
            CleanupPreset::Minimal => minimal,
            CleanupPreset::Standard => Self {
                fix_ligatures: true,
                remove_soft_hyphens: true,
                remove_replacement_char: true,
                ..minimal
            },
            CleanupPreset::Aggressive => Self {
                fix_ligatures: true,
                remove_soft_hyphens: true,
                remove_replacement_char: true,
                remove_pua: true,
                standardize_bullets: true,
                ..minimal
            },
        }
    }

    fn rewrites_chars(&self) -> bool {
        self.fix_ligatures
            || self.remove_soft_hyphens
            || self.remove_replacement_char
            || self.remove_pua
            || self.standardize_bullets
    }
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self::from_preset(CleanupPreset::Standard)
    }
}

/// Text cleanup pipeline.
#[derive(Debug, Clone, Default)]
pub struct TextCleanup {
    options: CleanupOptions,
}

impl TextCleanup {
    pub fn new(options: CleanupOptions) -> Self {
        Self { options }
    }

    pub fn from_preset(preset: CleanupPreset) -> Self {
        Self::new(CleanupOptions::from_preset(preset))
    }

    /// Clean one run of text. Leading and trailing whitespace is collapsed
    /// but kept, so adjacent runs still join with a space.
    pub fn process(&self, text: &str) -> String {
        let mut result: String = if self.options.normalize_unicode {
            text.nfc().collect()
        } else {
            text.to_string()
        };

        if self.options.rewrites_chars() {
            let mut out = String::with_capacity(result.len());
            for c in result.chars() {
                self.push_char(&mut out, c);
            }
            result = out;
        }

        if self.options.collapse_whitespace {
            result = WHITESPACE_RE.replace_all(&result, " ").into_owned();
        }
        result
    }

    fn push_char(&self, out: &mut String, c: char) {
        if self.options.fix_ligatures {
            if let Some((_, replacement)) = LIGATURES.iter().find(|(l, _)| *l == c) {
                out.push_str(replacement);
                return;
            }
        }
        if self.options.remove_soft_hyphens && c == '\u{00AD}' {
            return;
        }
        if self.options.remove_replacement_char && c == '\u{FFFD}' {
            return;
        }
        if self.options.remove_pua && is_private_use(c) {
            return;
        }
        if self.options.standardize_bullets
            && matches!(c, '●' | '○' | '■' | '□' | '◆' | '◇' | '▪' | '▫' | '►' | '▻')
        {
            out.push('•');
            return;
        }
        out.push(c);
    }
}

fn is_private_use(c: char) -> bool {
    let code = c as u32;
    (0xE000..=0xF8FF).contains(&code)
        || (0xF0000..=0xFFFFD).contains(&code)
        || (0x100000..=0x10FFFD).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicode_normalization() {
        let cleanup = TextCleanup::from_preset(CleanupPreset::Minimal);
        assert_eq!(cleanup.process("cafe\u{0301}"), "café");
    }

    #[test]
    fn test_ligature_fix() {
        let cleanup = TextCleanup::default();
        assert_eq!(cleanup.process("ﬁnding ﬂowers"), "finding flowers");
    }

    #[test]
    fn test_soft_hyphen_and_replacement_removed() {
        let cleanup = TextCleanup::default();
        assert_eq!(cleanup.process("align\u{00AD}ment\u{FFFD}"), "alignment");
    }

    #[test]
    fn test_whitespace_collapsed_not_trimmed() {
        let cleanup = TextCleanup::default();
        assert_eq!(cleanup.process("  two\n\twords "), " two words ");
    }

    #[test]
    fn test_aggressive_bullets_and_pua() {
        let cleanup = TextCleanup::from_preset(CleanupPreset::Aggressive);
        assert_eq!(cleanup.process("● item\u{E000}"), "• item");
        let standard = TextCleanup::default();
        assert_eq!(standard.process("● item"), "● item");
    }

    #[test]
    fn test_arabic_text_untouched() {
        let cleanup = TextCleanup::default();
        assert_eq!(cleanup.process("مرحبا بالعالم"), "مرحبا بالعالم");
    }
}
