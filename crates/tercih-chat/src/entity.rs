//! Entity extraction from user messages.
//!
//! Catalog entities (university, department) are found by sliding token
//! windows over the prepared message and ranking each window against the
//! catalog with the [`FuzzyMatcher`]. Score types and languages use static
//! lookup tables. Exam counts follow `<subject> <n> doğru [<m> yanlış]`
//! (short forms `35d 5y` work too); numbers outside such a pattern are
//! returned as a plain list. Nothing here fails: unknown tokens are skipped.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use tercih_core::config::ExtractorConfig;
use tercih_core::{
    CatalogItem, EntityKind, EntityMap, EntityValue, ExamResults, ExamStage, Intent, Subject,
    SubjectCounts,
};

use crate::catalog::CatalogSnapshot;
use crate::fuzzy::{FuzzyMatcher, LevenshteinSimilarity, SearchField, SimilarityMetric};
use crate::normalizer::normalize;
use crate::types::{EntityMatch, Span};

/// Number token, optionally glued to a `d`(oğru) / `y`(anlış) marker.
static COUNT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(d|y)?$").expect("Invalid count token regex"));

const CORRECT_MARKERS: &[&str] = &["dogru", "d"];
const WRONG_MARKERS: &[&str] = &["yanlis", "y"];

// =============================================================================
// Tables
// =============================================================================

/// Static lookup tables used by the extractor. All keys are normalized.
#[derive(Debug, Clone)]
pub struct EntityTables {
    score_types: Vec<(Vec<String>, String)>,
    languages: Vec<(String, String)>,
    subjects: Vec<(Vec<String>, Subject)>,
    question_counts: Vec<(ExamStage, Subject, u32)>,
    stopwords: HashSet<String>,
    plans: Vec<(Intent, Vec<EntityKind>)>,
}

fn phrase_tokens(phrase: &str) -> Vec<String> {
    normalize(phrase)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

impl Default for EntityTables {
    fn default() -> Self {
        let mut score_types: Vec<(Vec<String>, String)> = [
            ("sayısal", "SAY"),
            ("say", "SAY"),
            ("eşit ağırlık", "EA"),
            ("ea", "EA"),
            ("sözel", "SÖZ"),
            ("söz", "SÖZ"),
            ("yabancı dil", "DİL"),
            ("dil", "DİL"),
            ("tyt", "TYT"),
        ]
        .iter()
        .map(|(k, v)| (phrase_tokens(k), v.to_string()))
        .collect();
        score_types.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let languages = [
            ("ingilizce", "en"),
            ("almanca", "de"),
            ("fransızca", "fr"),
            ("türkçe", "tr"),
        ]
        .iter()
        .map(|(k, v)| (normalize(k), v.to_string()))
        .collect();

        let mut subjects: Vec<(Vec<String>, Subject)> = [
            ("türkçe", Subject::Turkish),
            ("matematik", Subject::Mathematics),
            ("mat", Subject::Mathematics),
            ("fen", Subject::Science),
            ("fen bilimleri", Subject::Science),
            ("sosyal", Subject::Social),
            ("sosyal bilimler", Subject::Social),
            ("fizik", Subject::Physics),
            ("kimya", Subject::Chemistry),
            ("biyoloji", Subject::Biology),
            ("biyo", Subject::Biology),
            ("edebiyat", Subject::Literature),
            ("tarih", Subject::History),
            ("coğrafya", Subject::Geography),
            ("felsefe", Subject::Philosophy),
        ]
        .iter()
        .map(|(k, v)| (phrase_tokens(k), *v))
        .collect();
        subjects.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let question_counts = vec![
            (ExamStage::Tyt, Subject::Turkish, 40),
            (ExamStage::Tyt, Subject::Mathematics, 40),
            (ExamStage::Tyt, Subject::Science, 20),
            (ExamStage::Tyt, Subject::Social, 20),
            (ExamStage::Ayt, Subject::Mathematics, 40),
            (ExamStage::Ayt, Subject::Physics, 14),
            (ExamStage::Ayt, Subject::Chemistry, 13),
            (ExamStage::Ayt, Subject::Biology, 13),
            (ExamStage::Ayt, Subject::Literature, 24),
            (ExamStage::Ayt, Subject::History, 21),
            (ExamStage::Ayt, Subject::Geography, 17),
            (ExamStage::Ayt, Subject::Philosophy, 12),
        ];

        let stopwords = [
            "için", "kaç", "ne", "nedir", "mi", "mı", "mu", "mü", "ve", "ile", "de", "da",
            "ya", "bir", "bu", "şu", "o", "en", "çok", "var", "yok", "peki", "hangi", "nasıl",
            "gerekir", "lazım", "ben", "benim", "istiyorum", "taban", "puan", "puanı", "net",
            "kontenjan", "kontenjanı", "sıralama", "tyt", "ayt", "doğru", "yanlış", "merhaba",
            "selam", "bugün", "yarın", "şimdi", "hava", "güzel", "iyi", "tamam", "evet", "hayır",
            "lütfen",
        ]
        .iter()
        .map(|w| normalize(w))
        .collect();

        use EntityKind::*;
        let catalog_kinds = vec![University, Department, ScoreType, Language];
        let plans = vec![
            (
                Intent::NetCalculation,
                vec![
                    University, Department, ScoreType, Language, TytScores, AytScores, Numbers,
                ],
            ),
            (Intent::TytCalculation, vec![TytScores, AytScores, Numbers]),
            (Intent::AytCalculation, vec![TytScores, AytScores, Numbers]),
            (Intent::BaseScore, catalog_kinds.clone()),
            (Intent::QuotaInquiry, catalog_kinds.clone()),
            (Intent::DepartmentSearch, vec![University, ScoreType, Language]),
            (Intent::UniversityInfo, vec![University]),
            (Intent::General, catalog_kinds.clone()),
            (Intent::ClarificationNeeded, catalog_kinds),
        ];

        Self {
            score_types,
            languages,
            subjects,
            question_counts,
            stopwords,
            plans,
        }
    }
}

impl EntityTables {
    /// Entity kinds worth extracting for an intent; empty for social intents.
    pub fn kinds_for(&self, intent: Intent) -> &[EntityKind] {
        self.plans
            .iter()
            .find(|(i, _)| *i == intent)
            .map(|(_, k)| k.as_slice())
            .unwrap_or(&[])
    }

    pub fn question_count(&self, stage: ExamStage, subject: Subject) -> Option<u32> {
        self.question_counts
            .iter()
            .find(|(s, subj, _)| *s == stage && *subj == subject)
            .map(|(_, _, n)| *n)
    }

    fn stages_of(&self, subject: Subject) -> Vec<ExamStage> {
        self.question_counts
            .iter()
            .filter(|(_, subj, _)| *subj == subject)
            .map(|(s, _, _)| *s)
            .collect()
    }

    fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }
}

// =============================================================================
// EntityExtractor
// =============================================================================

/// Extracts typed entities from a message.
pub struct EntityExtractor {
    config: ExtractorConfig,
    matcher: FuzzyMatcher,
    tables: EntityTables,
}

impl EntityExtractor {
    pub fn new(config: ExtractorConfig, matcher: FuzzyMatcher, tables: EntityTables) -> Self {
        Self {
            config,
            matcher,
            tables,
        }
    }

    pub fn matcher(&self) -> &FuzzyMatcher {
        &self.matcher
    }

    pub fn tables(&self) -> &EntityTables {
        &self.tables
    }

    /// Extract the kinds the intent's plan asks for.
    pub fn extract_for_intent(
        &self,
        text: &str,
        intent: Intent,
        catalog: &CatalogSnapshot,
    ) -> Vec<EntityMatch> {
        self.extract(text, self.tables.kinds_for(intent), Some(intent), catalog)
    }

    /// Extract the requested entity kinds.
    ///
    /// `intent` only steers which exam stage subject counts belong to.
    pub fn extract(
        &self,
        text: &str,
        kinds: &[EntityKind],
        intent: Option<Intent>,
        catalog: &CatalogSnapshot,
    ) -> Vec<EntityMatch> {
        let prepared = self.matcher.normalizer().prepare(text);
        let tokens: Vec<&str> = prepared.split(' ').filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() || kinds.is_empty() {
            return Vec::new();
        }

        let wants = |k: EntityKind| kinds.contains(&k);
        let mut consumed = vec![false; tokens.len()];
        let mut matches = Vec::new();

        if wants(EntityKind::TytScores) || wants(EntityKind::AytScores) {
            for m in self.extract_exam_counts(&tokens, intent, &mut consumed) {
                if wants(m.kind) {
                    matches.push(m);
                }
            }
        }

        if wants(EntityKind::University) {
            if let Some(m) = self.best_catalog_match(
                EntityKind::University,
                &tokens,
                &consumed,
                &catalog.universities,
            ) {
                matches.push(m);
            }
        }
        if wants(EntityKind::Department) {
            if let Some(m) = self.best_catalog_match(
                EntityKind::Department,
                &tokens,
                &consumed,
                &catalog.departments,
            ) {
                matches.push(m);
            }
        }
        if wants(EntityKind::ScoreType) {
            if let Some(m) = self.extract_score_type(&tokens, &consumed) {
                matches.push(m);
            }
        }
        if wants(EntityKind::Language) {
            if let Some(m) = self.extract_language(&tokens, &consumed) {
                matches.push(m);
            }
        }
        if wants(EntityKind::Numbers) {
            if let Some(m) = extract_numbers(&tokens, &consumed) {
                matches.push(m);
            }
        }

        debug!(
            "Extracted {} entities from {:?}: {:?}",
            matches.len(),
            prepared,
            matches.iter().map(|m| m.kind).collect::<Vec<_>>()
        );
        matches
    }

    // ---- catalog entities ----

    fn best_catalog_match(
        &self,
        kind: EntityKind,
        tokens: &[&str],
        consumed: &[bool],
        items: &[CatalogItem],
    ) -> Option<EntityMatch> {
        if items.is_empty() {
            return None;
        }

        let mut best: Option<EntityMatch> = None;
        for start in 0..tokens.len() {
            for len in 1..=self.config.max_span_tokens {
                let end = start + len;
                if end > tokens.len() {
                    break;
                }
                let window = &tokens[start..end];
                if !self.is_candidate_span(window, &consumed[start..end]) {
                    continue;
                }

                let span_text = window.join(" ");
                let key = self.matcher.normalizer().matching_key(&span_text);
                let exact_only = key.chars().count() < self.config.min_fuzzy_span_chars;

                let Some(found) = self
                    .matcher
                    .find_matches(&span_text, items, catalog_fields, 1)
                    .into_iter()
                    .next()
                else {
                    continue;
                };
                if exact_only && !found.exact {
                    continue;
                }

                // Higher score wins; on equal score the longer, then earlier, span.
                let better = match &best {
                    None => true,
                    Some(b) => {
                        found.score > b.confidence
                            || (found.score == b.confidence && len > b.span.end - b.span.start)
                    }
                };
                if better {
                    best = Some(EntityMatch {
                        kind,
                        value: EntityValue::Text(found.item.canonical_name.clone()),
                        confidence: found.score,
                        span: Span { start, end },
                        matched_text: span_text,
                    });
                }
            }
        }
        best
    }

    fn is_candidate_span(&self, window: &[&str], consumed: &[bool]) -> bool {
        let (Some(first), Some(last)) = (window.first(), window.last()) else {
            return false;
        };
        !consumed.iter().any(|c| *c)
            && !self.tables.is_stopword(first)
            && !self.tables.is_stopword(last)
            && !window.iter().any(|t| t.parse::<f64>().is_ok())
            && !window
                .iter()
                .all(|t| self.matcher.normalizer().is_filler(t))
    }

    // ---- score type / language ----

    fn extract_score_type(&self, tokens: &[&str], consumed: &[bool]) -> Option<EntityMatch> {
        for start in 0..tokens.len() {
            if consumed[start] {
                continue;
            }
            for (key, code) in &self.tables.score_types {
                let end = start + key.len();
                if end > tokens.len() {
                    continue;
                }
                let window = &tokens[start..end];
                let exact = window.iter().zip(key).all(|(t, k)| *t == k);
                // Suffixed forms ("sayısaldan", "sözelci") for longer keys.
                let suffixed = !exact
                    && key.len() == 1
                    && key[0].chars().count() >= 4
                    && window[0].starts_with(key[0].as_str());
                if exact || suffixed {
                    return Some(EntityMatch {
                        kind: EntityKind::ScoreType,
                        value: EntityValue::Text(code.clone()),
                        confidence: if exact { 1.0 } else { 0.9 },
                        span: Span { start, end },
                        matched_text: window.join(" "),
                    });
                }
            }
        }
        None
    }

    fn extract_language(&self, tokens: &[&str], consumed: &[bool]) -> Option<EntityMatch> {
        let metric = LevenshteinSimilarity;
        for (i, token) in tokens.iter().enumerate() {
            if consumed[i] {
                continue;
            }
            // "türkçe 30" is a subject count, not a language.
            if tokens.get(i + 1).is_some_and(|n| n.parse::<f64>().is_ok()) {
                continue;
            }
            for (key, code) in &self.tables.languages {
                let confidence = if token.starts_with(key.as_str()) {
                    1.0
                } else if token.chars().count() >= 5 {
                    metric.similarity(token, key)
                } else {
                    0.0
                };
                if confidence >= self.config.language_similarity {
                    return Some(EntityMatch {
                        kind: EntityKind::Language,
                        value: EntityValue::Text(code.clone()),
                        confidence,
                        span: Span {
                            start: i,
                            end: i + 1,
                        },
                        matched_text: token.to_string(),
                    });
                }
            }
        }
        None
    }

    // ---- exam counts ----

    fn extract_exam_counts(
        &self,
        tokens: &[&str],
        intent: Option<Intent>,
        consumed: &mut [bool],
    ) -> Vec<EntityMatch> {
        let mut tyt = (ExamResults::new(), None::<Span>);
        let mut ayt = (ExamResults::new(), None::<Span>);
        let mut explicit_stage: Option<ExamStage> = None;

        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                "tyt" => explicit_stage = Some(ExamStage::Tyt),
                "ayt" => explicit_stage = Some(ExamStage::Ayt),
                _ => {}
            }

            let Some((subject, subject_len)) = self.subject_at(tokens, i) else {
                i += 1;
                continue;
            };
            let Some((correct, wrong, end)) = parse_counts(tokens, i + subject_len) else {
                i += 1;
                continue;
            };

            let stage = self.resolve_stage(subject, explicit_stage, intent);
            let Some(question_count) = self.tables.question_count(stage, subject) else {
                i = end;
                continue;
            };

            let correct = correct.min(question_count);
            let counts = match wrong {
                Some(w) => SubjectCounts {
                    correct,
                    wrong: w.min(question_count - correct),
                    wrong_inferred: false,
                },
                None => SubjectCounts {
                    correct,
                    wrong: question_count.saturating_sub(correct),
                    wrong_inferred: true,
                },
            };

            let start = if i > 0 && matches!(tokens[i - 1], "tyt" | "ayt") {
                i - 1
            } else {
                i
            };
            for c in consumed.iter_mut().take(end).skip(start) {
                *c = true;
            }

            let target = match stage {
                ExamStage::Tyt => &mut tyt,
                ExamStage::Ayt => &mut ayt,
            };
            target.0.insert(subject, counts);
            target.1 = Some(match target.1 {
                None => Span { start, end },
                Some(s) => Span {
                    start: s.start.min(start),
                    end: s.end.max(end),
                },
            });
            i = end;
        }

        let mut out = Vec::new();
        for (stage, (results, span)) in [(ExamStage::Tyt, tyt), (ExamStage::Ayt, ayt)] {
            if let Some(span) = span {
                out.push(EntityMatch {
                    kind: stage.entity_kind(),
                    value: EntityValue::Exam(results),
                    confidence: 1.0,
                    matched_text: tokens[span.start..span.end].join(" "),
                    span,
                });
            }
        }
        out
    }

    fn subject_at(&self, tokens: &[&str], i: usize) -> Option<(Subject, usize)> {
        self.tables.subjects.iter().find_map(|(key, subject)| {
            let end = i + key.len();
            (end <= tokens.len() && tokens[i..end].iter().zip(key).all(|(t, k)| *t == k))
                .then_some((*subject, key.len()))
        })
    }

    /// Explicit stage token, else the intent, else the subject's only stage, else TYT.
    fn resolve_stage(
        &self,
        subject: Subject,
        explicit: Option<ExamStage>,
        intent: Option<Intent>,
    ) -> ExamStage {
        let stages = self.tables.stages_of(subject);
        let hinted = explicit.or(match intent {
            Some(Intent::TytCalculation) => Some(ExamStage::Tyt),
            Some(Intent::AytCalculation) => Some(ExamStage::Ayt),
            _ => None,
        });
        match hinted {
            Some(stage) if stages.contains(&stage) => stage,
            _ if stages.len() == 1 => stages[0],
            _ => ExamStage::Tyt,
        }
    }
}

fn catalog_fields(item: &CatalogItem) -> Vec<SearchField<'_>> {
    std::iter::once(SearchField::name(&item.canonical_name))
        .chain(item.aliases.iter().map(|a| SearchField::alias(a)))
        .collect()
}

/// Parse `<n> doğru [<m> yanlış]` starting at `i`.
///
/// Returns correct, optional wrong and the index after the pattern.
fn parse_counts(tokens: &[&str], i: usize) -> Option<(u32, Option<u32>, usize)> {
    let (correct, mut next) = parse_marked_count(tokens, i, "d", CORRECT_MARKERS)?;
    let wrong = match parse_marked_count(tokens, next, "y", WRONG_MARKERS) {
        Some((w, after)) => {
            next = after;
            Some(w)
        }
        None => None,
    };
    Some((correct, wrong, next))
}

/// A count followed by a marker word, or glued to its short marker.
fn parse_marked_count(
    tokens: &[&str],
    i: usize,
    short: &str,
    markers: &[&str],
) -> Option<(u32, usize)> {
    let caps = COUNT_TOKEN_RE.captures(tokens.get(i)?)?;
    let n: u32 = caps.get(1)?.as_str().parse().ok()?;
    match caps.get(2).map(|m| m.as_str()) {
        Some(suffix) if suffix == short => Some((n, i + 1)),
        Some(_) => None,
        None => tokens
            .get(i + 1)
            .filter(|t| markers.contains(t))
            .map(|_| (n, i + 2)),
    }
}

fn extract_numbers(tokens: &[&str], consumed: &[bool]) -> Option<EntityMatch> {
    let mut numbers = Vec::new();
    let mut span: Option<Span> = None;
    for (i, t) in tokens.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        if let Ok(n) = t.parse::<f64>() {
            if n.is_finite() {
                numbers.push(n);
                span = Some(match span {
                    None => Span {
                        start: i,
                        end: i + 1,
                    },
                    Some(s) => Span {
                        start: s.start,
                        end: i + 1,
                    },
                });
            }
        }
    }
    let span = span?;
    Some(EntityMatch {
        kind: EntityKind::Numbers,
        matched_text: tokens[span.start..span.end].join(" "),
        value: EntityValue::Numbers(numbers),
        confidence: 1.0,
        span,
    })
}

/// Collapse matches into a map; the first match per kind wins.
pub fn to_entity_map(matches: &[EntityMatch]) -> EntityMap {
    let mut map = EntityMap::new();
    for m in matches {
        if !m.value.is_empty() {
            map.entry(m.kind).or_insert_with(|| m.value.clone());
        }
    }
    map
}
