//! Text normalization shared by every search comparison.
//!
//! # Processing Pipeline
//!
//! 1. **Lowercase**
//! 2. **Transliteration** - Cyrillic letters map to Latin via a fixed table
//! 3. **Diacritic stripping** - NFD decomposition, combining marks dropped
//! 4. **Punctuation removal** - everything except alphanumerics and spaces
//! 5. **Whitespace collapsing** - runs become one space, ends trimmed
//!
//! The output is idempotent: normalizing a normalized string returns it
//! unchanged.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Transliterate one lowercase Cyrillic letter.
///
/// Returns `None` for characters outside the table.
const fn transliterate_char(c: char) -> Option<&'static str> {
    Some(match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' | 'э' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' | 'і' => "i",
        'й' | 'ы' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    })
}

/// Transliterate Cyrillic letters in already-lowercased text.
#[must_use]
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match transliterate_char(c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

/// Normalize text for comparison.
///
/// Empty input yields an empty string.
#[must_use]
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lowered = text.to_lowercase();

    // Transliterate before decomposing so that 'й' keeps its own mapping,
    // then once more for letters that only surface after stripping marks
    // (e.g. 'ї' -> 'і').
    let stripped: String = transliterate(&lowered)
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let cleaned: String = transliterate(&stripped)
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| *c == ' ' || c.is_alphanumeric())
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize optional text, treating `None` as empty.
#[must_use]
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transliterates_cyrillic() {
        assert_eq!(normalize("Лопата"), "lopata");
        assert_eq!(normalize("Щётка для ОБУВИ"), "schetka dlya obuvi");
        assert_eq!(normalize("Шуруповёрт"), "shurupovert");
    }

    #[test]
    fn test_strips_punctuation_and_collapses_whitespace() {
        assert_eq!(normalize("  Дрель,   ударная!  "), "drel udarnaya");
        assert_eq!(normalize("Кабель\tВВГ-нг\n3x2.5"), "kabel vvgng 3x25");
    }

    #[test]
    fn test_strips_diacritics() {
        assert_eq!(normalize("Café Crème"), "cafe creme");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("!!!"), "");
        assert_eq!(normalize_opt(None), "");
    }

    #[test]
    fn test_cyrillic_output_is_ascii() {
        let normalized = normalize("Смеситель для ванны, хром (ёмкость 5л)");
        assert!(
            normalized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == ' ')
        );
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Лопата штыковая",
            "Café Crème",
            "  ÅNGSTRÖM -- 42 ",
            "Łódź",
            "İstanbul",
            "日本語 テキスト",
            "ẞ straße",
            "",
            "x\u{0301}y",
            "Їжак і йорж",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }
}
