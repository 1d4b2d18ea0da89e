//! Turkish-aware text normalization.
//!
//! Every matching decision in the engine runs on normalized text: lowercase,
//! Turkish letters folded to ASCII, punctuation turned into spaces (decimal
//! separators between digits survive as `.`), whitespace collapsed.
//! Displayed text is never normalized.

use std::collections::HashSet;

use tercih_core::config::NormalizerConfig;

/// Fold a single character into `out`; some characters vanish entirely.
fn fold_char(c: char, out: &mut Vec<char>) {
    match c {
        'ğ' | 'Ğ' => out.push('g'),
        'ü' | 'Ü' | 'û' | 'Û' => out.push('u'),
        'ş' | 'Ş' => out.push('s'),
        'ı' | 'I' | 'İ' | 'î' | 'Î' => out.push('i'),
        'ö' | 'Ö' => out.push('o'),
        'ç' | 'Ç' => out.push('c'),
        'â' | 'Â' => out.push('a'),
        // Combining dot above, left behind by some İ encodings.
        '\u{0307}' => {}
        _ => out.extend(c.to_lowercase()),
    }
}

/// Normalize text for matching.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mut folded = Vec::with_capacity(text.len());
    for c in text.chars() {
        fold_char(c, &mut folded);
    }

    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;
    for (i, &c) in folded.iter().enumerate() {
        let keep = if c.is_alphanumeric() {
            Some(c)
        } else if (c == '.' || c == ',')
            && i > 0
            && folded[i - 1].is_ascii_digit()
            && folded.get(i + 1).is_some_and(|n| n.is_ascii_digit())
        {
            Some('.')
        } else {
            None
        };

        match keep {
            Some(k) => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(k);
            }
            None => pending_space = true,
        }
    }
    out
}

// =============================================================================
// TextNormalizer
// =============================================================================

/// Normalizer with the configured filler-word and abbreviation tables.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    filler_words: HashSet<String>,
    /// Normalized short-form tokens -> normalized expansion, longest first.
    abbreviations: Vec<(Vec<String>, String)>,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

impl TextNormalizer {
    /// Build a normalizer; table entries may be given in any casing.
    pub fn new(config: &NormalizerConfig) -> Self {
        let filler_words = config
            .filler_words
            .iter()
            .map(|w| normalize(w))
            .filter(|w| !w.is_empty())
            .collect();

        let mut abbreviations: Vec<(Vec<String>, String)> = config
            .abbreviations
            .iter()
            .filter_map(|(short, long)| {
                let key: Vec<String> = normalize(short)
                    .split(' ')
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
                if key.is_empty() {
                    None
                } else {
                    Some((key, normalize(long)))
                }
            })
            .collect();
        abbreviations.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self {
            filler_words,
            abbreviations,
        }
    }

    /// See [`normalize`].
    pub fn normalize(&self, text: &str) -> String {
        normalize(text)
    }

    /// Whether a normalized token is a domain filler word.
    pub fn is_filler(&self, token: &str) -> bool {
        self.filler_words.contains(token)
    }

    /// Remove filler words from already-normalized text.
    pub fn strip_fillers(&self, normalized: &str) -> String {
        normalized
            .split(' ')
            .filter(|t| !t.is_empty() && !self.is_filler(t))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Normalized, filler-free form used to compare names.
    ///
    /// Falls back to the normalized text when it consists of fillers only.
    pub fn matching_key(&self, text: &str) -> String {
        let normalized = normalize(text);
        let stripped = self.strip_fillers(&normalized);
        if stripped.is_empty() {
            normalized
        } else {
            stripped
        }
    }

    /// Rewrite known short forms in already-normalized text, longest match first.
    pub fn expand_abbreviations(&self, normalized: &str) -> String {
        let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
        let mut out: Vec<&str> = Vec::with_capacity(tokens.len());
        let mut i = 0;
        'outer: while i < tokens.len() {
            for (key, expansion) in &self.abbreviations {
                let end = i + key.len();
                if end <= tokens.len() && tokens[i..end].iter().zip(key).all(|(t, k)| *t == k) {
                    if !expansion.is_empty() {
                        out.push(expansion.as_str());
                    }
                    i = end;
                    continue 'outer;
                }
            }
            out.push(tokens[i]);
            i += 1;
        }
        out.join(" ")
    }

    /// Normalize then expand abbreviations.
    pub fn prepare(&self, raw: &str) -> String {
        self.expand_abbreviations(&normalize(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- normalize ----

    #[test]
    fn test_normalize_turkish_letters() {
        assert_eq!(normalize("Boğaziçi Üniversitesi"), "bogazici universitesi");
        assert_eq!(normalize("IŞIK ÇİĞDEM Ödev"), "isik cigdem odev");
    }

    #[test]
    fn test_normalize_dotted_capital_i() {
        assert_eq!(normalize("İTÜ"), "itu");
        assert_eq!(normalize("i\u{0307}tü"), "itu");
    }

    #[test]
    fn test_normalize_collapses_whitespace_and_punctuation() {
        assert_eq!(normalize("  kaç   net\tgerekir?? "), "kac net gerekir");
        assert_eq!(normalize("Elektrik-Elektronik"), "elektrik elektronik");
        assert_eq!(normalize("ODTÜ'nün"), "odtu nun");
    }

    #[test]
    fn test_normalize_keeps_decimal_separators() {
        assert_eq!(normalize("35,5 doğru"), "35.5 dogru");
        assert_eq!(normalize("puan: 480.25."), "puan 480.25");
        assert_eq!(normalize("a,b"), "a b");
    }

    #[test]
    fn test_normalize_idempotent() {
        let samples = [
            "İTÜ bilgisayar mühendisliği için kaç net gerekir",
            "  TYT matematik 35 doğru, 5 yanlış!! ",
            "%100 İngilizce — ODTÜ?",
            "3,5.2,,1",
            "",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!."), "");
    }

    // ---- fillers ----

    #[test]
    fn test_strip_fillers() {
        let n = TextNormalizer::default();
        assert_eq!(
            n.strip_fillers(&normalize("Bilgisayar Mühendisliği")),
            "bilgisayar"
        );
        assert_eq!(
            n.strip_fillers(&normalize("Orta Doğu Teknik Üniversitesi")),
            "orta dogu teknik"
        );
    }

    #[test]
    fn test_matching_key_falls_back_when_only_fillers() {
        let n = TextNormalizer::default();
        assert_eq!(n.matching_key("Üniversitesi"), "universitesi");
        assert_eq!(n.matching_key("Boğaziçi Üniversitesi"), "bogazici");
    }

    // ---- abbreviations ----

    #[test]
    fn test_expand_abbreviations_multi_token_first() {
        let n = TextNormalizer::default();
        assert_eq!(
            n.expand_abbreviations("itu bilg muh taban"),
            "itu bilgisayar muhendisligi taban"
        );
        assert_eq!(n.expand_abbreviations("makine muh"), "makine muhendisligi");
    }

    #[test]
    fn test_expand_abbreviations_whole_tokens_only() {
        let n = TextNormalizer::default();
        assert_eq!(n.expand_abbreviations("muhasebe"), "muhasebe");
    }

    #[test]
    fn test_custom_tables_are_normalized() {
        let mut config = NormalizerConfig::default();
        config.filler_words = vec!["FAKÜLTESİ".to_string()];
        config.abbreviations = [("YTÜ".to_string(), "Yıldız Teknik".to_string())]
            .into_iter()
            .collect();
        let n = TextNormalizer::new(&config);
        assert!(n.is_filler("fakultesi"));
        assert_eq!(n.prepare("YTÜ tıp"), "yildiz teknik tip");
    }
}
