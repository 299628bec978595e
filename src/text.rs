//! Text cleanup shared by extraction, normalization and the store barrier.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::types::CanonicalEvent;

static CORRUPTION_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x{FFFD}|Ã|Â|â[\x{80}-\x{BF}€]").expect("valid mojibake pattern"));

/// Unrecognized-character markers: replacement chars plus UTF-8-read-as-Latin-1 artifacts.
fn corruption_markers(value: &str) -> usize {
    CORRUPTION_HINT.find_iter(value).count()
}

/// Windows-1252 code points that sit outside Latin-1, mapped back to their byte.
fn cp1252_byte(ch: char) -> Option<u8> {
    let byte = match ch {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Re-decodes text that was UTF-8 misread as Latin-1/Windows-1252.
///
/// The repaired form is kept only when it strictly lowers the number of
/// corruption markers; otherwise the input comes back untouched.
pub fn fix_mojibake(value: &str) -> String {
    if value.is_empty() || !CORRUPTION_HINT.is_match(value) {
        return value.to_string();
    }

    let mut bytes = Vec::with_capacity(value.len());
    for ch in value.chars() {
        let code = ch as u32;
        if code <= 0xFF {
            bytes.push(code as u8);
        } else if let Some(byte) = cp1252_byte(ch) {
            bytes.push(byte);
        } else {
            // Not representable as a single legacy byte, so this is not a clean mis-decode
            return value.to_string();
        }
    }

    let repaired = String::from_utf8_lossy(&bytes).into_owned();
    if corruption_markers(&repaired) < corruption_markers(value) {
        repaired
    } else {
        value.to_string()
    }
}

fn fold_char(ch: char) -> Option<char> {
    let folded = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        // Combining diacritical marks
        '\u{0300}'..='\u{036F}' => return None,
        other => other,
    };
    Some(folded)
}

/// Lower-cases and strips accents (`"Março"` -> `"marco"`).
pub fn normalize_text(value: &str) -> String {
    value.to_lowercase().chars().filter_map(fold_char).collect()
}

/// Collapses runs of whitespace into single spaces and trims.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Accent-folded, lower-case, every non-alphanumeric run collapsed to one space.
pub fn normalize_for_key(value: &str) -> String {
    let cleaned: String = normalize_text(value)
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { ' ' })
        .collect();
    collapse_whitespace(&cleaned)
}

/// Composite identity of a stored event: name, date, location and link.
pub fn dedup_key(event: &CanonicalEvent) -> String {
    [&event.name, &event.date, &event.location, &event.link]
        .iter()
        .map(|part| normalize_for_key(part))
        .collect::<Vec<_>>()
        .join("|")
}

/// Host of a link without a leading `www.`, empty when the link does not parse.
pub fn host_from_link(link: &str) -> String {
    Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .map(|h| h.trim_start_matches("www.").to_string())
        .unwrap_or_default()
}

/// First `max` characters (not bytes) of `value`.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repairs_utf8_read_as_latin1() {
        assert_eq!(fix_mojibake("SÃ£o JoÃ£o"), "São João");
        assert_eq!(fix_mojibake("ExposiÃ§Ã£o"), "Exposição");
    }

    #[test]
    fn leaves_clean_text_alone() {
        assert_eq!(fix_mojibake("São João"), "São João");
        assert_eq!(fix_mojibake(""), "");
    }

    #[test]
    fn keeps_original_when_repair_does_not_help() {
        // A lone replacement char cannot be re-decoded into anything better
        assert_eq!(fix_mojibake("Show \u{FFFD} Recife"), "Show \u{FFFD} Recife");
    }

    #[test]
    fn repairs_windows_1252_quotes() {
        assert_eq!(fix_mojibake("Rock nâ€™ Roll"), "Rock n’ Roll");
    }

    #[test]
    fn normalizes_accents_and_case() {
        assert_eq!(normalize_text("Março ÁGUA"), "marco agua");
        assert_eq!(normalize_for_key("  Show X!! -- Recife/PE "), "show x recife pe");
    }

    #[test]
    fn dedup_key_ignores_case_and_punctuation() {
        let a = CanonicalEvent {
            id: "001".into(),
            name: "Show X".into(),
            description: String::new(),
            date: "21-03-2026".into(),
            location: "Marco Zero".into(),
            display_time: String::new(),
            is_free: false,
            category: String::new(),
            link: "https://a.com/evento/1".into(),
            saved: false,
        };
        let mut b = a.clone();
        b.id = "002".into();
        b.name = "show x".into();
        assert_eq!(dedup_key(&a), dedup_key(&b));
        assert_eq!(dedup_key(&a), "show x|21 03 2026|marco zero|https a com evento 1");
    }

    #[test]
    fn host_strips_www() {
        assert_eq!(host_from_link("https://www.Sympla.com.br/evento/x"), "sympla.com.br");
        assert_eq!(host_from_link("#"), "");
    }
}
