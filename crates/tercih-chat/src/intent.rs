//! Weighted-keyword intent classification.
//!
//! Every classifiable intent owns a table of phrases with weights. A phrase
//! matches when it starts at a word boundary of the normalized message, so
//! "teşekkür" also covers "teşekkürler". Phrases of up to
//! [`WHOLE_WORD_MAX_CHARS`] characters must match a whole word instead, so
//! "hey" does not fire on "heyecan". Context modifiers then add:
//!
//! - a numeric boost to calculation intents when the message has numbers,
//! - a question boost to inquiry intents for questions,
//! - a stickiness bias toward the previous turn's intent.
//!
//! The highest score wins; ties go to the intent with more matched phrases,
//! then to declaration order. Below the evidence floor the message falls
//! back to `general` or, when it looks like a question,
//! `clarification_needed`.

use tracing::debug;

use tercih_core::config::ClassifierConfig;
use tercih_core::Intent;

use crate::normalizer::normalize;
use crate::types::IntentClassification;

// =============================================================================
// Keyword tables
// =============================================================================

/// Phrases this short only match whole words.
pub const WHOLE_WORD_MAX_CHARS: usize = 3;

/// Normalized phrase with its weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPhrase {
    pub phrase: String,
    pub weight: f64,
}

impl WeightedPhrase {
    /// Match against a normalized message padded with one space on each side.
    fn matches(&self, padded: &str) -> bool {
        if self.phrase.chars().count() <= WHOLE_WORD_MAX_CHARS {
            padded.contains(&format!(" {} ", self.phrase))
        } else {
            padded.contains(&format!(" {}", self.phrase))
        }
    }
}

/// Phrase tables per intent, plus the interrogative words used for question
/// detection.
#[derive(Debug, Clone)]
pub struct IntentKeywords {
    tables: Vec<(Intent, Vec<WeightedPhrase>)>,
    interrogatives: Vec<String>,
}

impl IntentKeywords {
    /// Build tables from raw phrases; phrases are normalized here.
    pub fn new(tables: &[(Intent, &[(&str, f64)])], interrogatives: &[&str]) -> Self {
        let tables = tables
            .iter()
            .map(|(intent, phrases)| {
                let phrases = phrases
                    .iter()
                    .map(|(p, w)| WeightedPhrase {
                        phrase: normalize(p),
                        weight: *w,
                    })
                    .filter(|p| !p.phrase.is_empty())
                    .collect();
                (*intent, phrases)
            })
            .collect();
        Self {
            tables,
            interrogatives: interrogatives.iter().map(|w| normalize(w)).collect(),
        }
    }

    pub fn phrases(&self, intent: Intent) -> &[WeightedPhrase] {
        self.tables
            .iter()
            .find(|(i, _)| *i == intent)
            .map(|(_, p)| p.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for IntentKeywords {
    fn default() -> Self {
        Self::new(
            &[
                (
                    Intent::NetCalculation,
                    &[
                        ("net", 1.0),
                        ("kaç net", 1.5),
                        ("net hesapla", 2.0),
                        ("net gerek", 1.0),
                        ("hesapla", 0.8),
                        ("doğru", 0.5),
                        ("yanlış", 0.5),
                    ],
                ),
                (
                    Intent::TytCalculation,
                    &[
                        ("tyt", 2.5),
                        ("temel yeterlilik", 2.0),
                        ("türkçe", 0.5),
                        ("matematik", 0.5),
                        ("fen", 0.5),
                        ("sosyal", 0.5),
                    ],
                ),
                (
                    Intent::AytCalculation,
                    &[
                        ("ayt", 2.5),
                        ("alan yeterlilik", 2.0),
                        ("fizik", 0.5),
                        ("kimya", 0.5),
                        ("biyoloji", 0.5),
                        ("edebiyat", 0.5),
                        ("tarih", 0.5),
                        ("coğrafya", 0.5),
                        ("felsefe", 0.5),
                    ],
                ),
                (
                    Intent::BaseScore,
                    &[
                        ("taban puan", 2.5),
                        ("taban", 1.5),
                        ("kaç puan", 1.5),
                        ("puanı kaç", 1.0),
                        ("sıralama", 1.0),
                    ],
                ),
                (
                    Intent::QuotaInquiry,
                    &[
                        ("kontenjan", 2.5),
                        ("kaç kişi", 1.5),
                        ("kaç öğrenci", 1.5),
                    ],
                ),
                (
                    Intent::DepartmentSearch,
                    &[
                        ("hangi bölüm", 2.0),
                        ("bölümler", 1.5),
                        ("bölüm listesi", 2.0),
                        ("programlar", 1.5),
                    ],
                ),
                (
                    Intent::UniversityInfo,
                    &[
                        ("hakkında", 1.5),
                        ("kampüs", 1.5),
                        ("bilgi", 1.0),
                        ("yurt", 1.0),
                        ("burs", 1.0),
                        ("nasıl bir", 1.0),
                    ],
                ),
                (
                    Intent::StudyAdvice,
                    &[
                        ("nasıl çalış", 2.0),
                        ("çalışma programı", 2.0),
                        ("motivasyon", 2.0),
                        ("tavsiye", 1.5),
                        ("öneri", 1.5),
                        ("deneme", 1.0),
                    ],
                ),
                (
                    Intent::Completed,
                    &[
                        ("görüşürüz", 2.0),
                        ("hoşça kal", 2.0),
                        ("güle güle", 2.0),
                        ("bu kadar", 1.5),
                        ("tamamdır", 1.0),
                    ],
                ),
                (
                    Intent::Thanks,
                    &[
                        ("teşekkür", 2.0),
                        ("sağ ol", 2.0),
                        ("sağol", 2.0),
                        ("eyvallah", 1.5),
                    ],
                ),
                (
                    Intent::Greeting,
                    &[
                        ("merhaba", 1.5),
                        ("selam", 1.5),
                        ("günaydın", 1.5),
                        ("iyi günler", 1.0),
                        ("hey", 1.0),
                    ],
                ),
            ],
            &[
                "mi", "mı", "mu", "mü", "midir", "mudur", "misin", "ne", "nedir", "neden",
                "kaç", "hangi", "nasıl", "nerede", "kim",
            ],
        )
    }
}

// =============================================================================
// IntentClassifier
// =============================================================================

#[derive(Debug, Clone)]
struct Candidate {
    intent: Intent,
    score: f64,
    evidence: Vec<String>,
}

/// Picks one intent per message.
pub struct IntentClassifier {
    config: ClassifierConfig,
    keywords: IntentKeywords,
}

impl IntentClassifier {
    pub fn new(config: ClassifierConfig, keywords: IntentKeywords) -> Self {
        Self { config, keywords }
    }

    /// Classify a message, raw or already normalized.
    ///
    /// Never fails: no evidence resolves to a fallback intent.
    pub fn classify(&self, text: &str, previous: Option<Intent>) -> IntentClassification {
        let normalized = normalize(text);
        let padded = format!(" {} ", normalized);
        let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();

        let has_numbers = tokens.iter().any(|t| t.parse::<f64>().is_ok());
        let is_question = self.is_question(text, &tokens);

        let mut best: Option<Candidate> = None;
        for intent in Intent::CLASSIFIABLE {
            let mut score = 0.0;
            let mut evidence = Vec::new();
            for p in self.keywords.phrases(intent) {
                if p.matches(&padded) {
                    score += p.weight;
                    evidence.push(p.phrase.clone());
                }
            }
            if has_numbers && intent.is_calculation() {
                score += self.config.numeric_boost;
            }
            if is_question && intent.is_inquiry() {
                score += self.config.question_boost;
            }
            if previous == Some(intent) {
                score += self.config.stickiness;
            }

            let candidate = Candidate {
                intent,
                score,
                evidence,
            };
            // CLASSIFIABLE is in declaration order, so strict comparison
            // keeps the earlier intent on a full tie.
            let better = match &best {
                None => true,
                Some(b) => {
                    candidate.score > b.score
                        || (candidate.score == b.score
                            && candidate.evidence.len() > b.evidence.len())
                }
            };
            if better {
                best = Some(candidate);
            }
        }

        let Some(best) = best else {
            return self.fallback(is_question, 0.0);
        };

        if best.score < self.config.min_evidence {
            debug!(
                "No intent reached the evidence floor (best {} at {:.2})",
                best.intent, best.score
            );
            return self.fallback(is_question, best.score);
        }

        debug!(
            "Classified as {} (score {:.2}, evidence {:?})",
            best.intent, best.score, best.evidence
        );
        IntentClassification {
            intent: best.intent,
            confidence: self.confidence(best.score),
            evidence: best.evidence,
            score: best.score,
        }
    }

    /// `1 - exp(-score / scale)`: 0 without evidence, approaching 1 as it saturates.
    pub fn confidence(&self, score: f64) -> f64 {
        if score <= 0.0 {
            return 0.0;
        }
        (1.0 - (-score / self.config.confidence_scale).exp()).clamp(0.0, 1.0)
    }

    /// Trailing `?` or an interrogative word.
    fn is_question(&self, raw: &str, tokens: &[&str]) -> bool {
        raw.trim_end().ends_with('?')
            || tokens
                .iter()
                .any(|t| self.keywords.interrogatives.iter().any(|q| q == t))
    }

    fn fallback(&self, is_question: bool, score: f64) -> IntentClassification {
        let intent = if is_question {
            Intent::ClarificationNeeded
        } else {
            Intent::General
        };
        IntentClassification {
            intent,
            confidence: self.confidence(score),
            evidence: Vec::new(),
            score,
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default(), IntentKeywords::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> IntentClassifier {
        IntentClassifier::default()
    }

    // ---- keyword evidence ----

    #[test]
    fn test_single_keyword_texts_select_their_intent() {
        let c = classifier();
        let samples = [
            ("net hesapla", Intent::NetCalculation),
            ("tyt", Intent::TytCalculation),
            ("ayt", Intent::AytCalculation),
            ("taban puan", Intent::BaseScore),
            ("kontenjan", Intent::QuotaInquiry),
            ("bölüm listesi", Intent::DepartmentSearch),
            ("kampüs", Intent::UniversityInfo),
            ("motivasyon", Intent::StudyAdvice),
            ("görüşürüz", Intent::Completed),
            ("teşekkürler", Intent::Thanks),
            ("merhaba", Intent::Greeting),
        ];
        for (text, expected) in samples {
            let result = c.classify(text, None);
            assert_eq!(result.intent, expected, "for {:?}", text);
            assert!(result.score >= ClassifierConfig::default().min_evidence);
            assert!(result.confidence > 0.0 && result.confidence <= 1.0);
            assert!(!result.evidence.is_empty());
        }
    }

    #[test]
    fn test_tyt_beats_greeting() {
        let c = classifier();
        let result = c.classify("TYT matematik 35 doğru 5 yanlış", None);
        assert_eq!(result.intent, Intent::TytCalculation);

        let result = c.classify("Merhaba, TYT matematik 35 doğru 5 yanlış", None);
        assert_eq!(result.intent, Intent::TytCalculation);
    }

    #[test]
    fn test_net_question() {
        let c = classifier();
        let result = c.classify("İTÜ bilgisayar mühendisliği için kaç net gerekir", None);
        assert_eq!(result.intent, Intent::NetCalculation);
        assert!(result.evidence.contains(&"kac net".to_string()));
    }

    #[test]
    fn test_prefix_match_at_word_start_only() {
        let c = classifier();
        // "internet" contains "net" but not at a word start.
        let result = c.classify("internet", None);
        assert_eq!(result.intent, Intent::General);
    }

    #[test]
    fn test_short_phrase_needs_whole_word() {
        let c = classifier();
        assert_ne!(c.classify("heyecanlıyım", None).intent, Intent::Greeting);
        assert_eq!(c.classify("hey", None).intent, Intent::Greeting);
        assert_eq!(c.classify("hey nasılsın", None).intent, Intent::Greeting);
        // Longer phrases still match as word prefixes.
        assert_eq!(c.classify("teşekkürler", None).intent, Intent::Thanks);
    }

    // ---- modifiers ----

    #[test]
    fn test_stickiness_continues_previous_intent() {
        let c = classifier();
        let without = c.classify("peki sıralama", None);
        let with = c.classify("peki sıralama", Some(Intent::BaseScore));
        assert!(with.score > without.score);
        assert_eq!(with.intent, Intent::BaseScore);
    }

    #[test]
    fn test_numeric_boost_only_for_calculation() {
        let c = classifier();
        let result = c.classify("matematik 30", None);
        assert_eq!(result.intent, Intent::TytCalculation);
        assert!((result.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_question_boost() {
        let c = classifier();
        let plain = c.classify("ODTÜ bilgi", None);
        let question = c.classify("ODTÜ bilgi?", None);
        assert_eq!(question.intent, Intent::UniversityInfo);
        assert!(question.score > plain.score);
    }

    // ---- fallback ----

    #[test]
    fn test_fallback_general() {
        let c = classifier();
        let result = c.classify("bugün hava güzel", None);
        assert_eq!(result.intent, Intent::General);
        assert_eq!(result.confidence, 0.0);
        assert!(result.evidence.is_empty());
    }

    #[test]
    fn test_fallback_clarification_for_questions() {
        let c = classifier();
        assert_eq!(c.classify("bu ne?", None).intent, Intent::ClarificationNeeded);
        assert_eq!(c.classify("peki ya o", None).intent, Intent::General);
        assert_eq!(
            c.classify("nasıl yani", None).intent,
            Intent::ClarificationNeeded
        );
    }

    #[test]
    fn test_empty_text() {
        let c = classifier();
        let result = c.classify("", None);
        assert_eq!(result.intent, Intent::General);
        assert_eq!(result.confidence, 0.0);
    }

    // ---- tie-break ----

    #[test]
    fn test_tie_break_prefers_more_evidence_then_declaration_order() {
        let keywords = IntentKeywords::new(
            &[
                (Intent::BaseScore, &[("alpha", 2.0)]),
                (Intent::QuotaInquiry, &[("beta", 1.0), ("gamma", 1.0)]),
                (Intent::Greeting, &[("delta", 2.0)]),
            ],
            &[],
        );
        let c = IntentClassifier::new(ClassifierConfig::default(), keywords);
        assert_eq!(
            c.classify("alpha beta gamma", None).intent,
            Intent::QuotaInquiry
        );
        assert_eq!(c.classify("delta alpha", None).intent, Intent::BaseScore);
    }

    // ---- confidence ----

    #[test]
    fn test_confidence_monotone_and_bounded() {
        let c = classifier();
        let mut last = 0.0;
        for i in 0..50 {
            let conf = c.confidence(i as f64 * 0.5);
            assert!((0.0..=1.0).contains(&conf));
            assert!(conf >= last);
            last = conf;
        }
        assert_eq!(c.confidence(0.0), 0.0);
        assert!(c.confidence(100.0) > 0.99);
    }
}
