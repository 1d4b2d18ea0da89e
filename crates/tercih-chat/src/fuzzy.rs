//! Approximate string matching against reference catalogs.
//!
//! A candidate's base similarity is the maximum of several independent
//! metrics (edit distance, bigram overlap, longest common subsequence), so
//! a name that fails only one of them is not penalized. Bonuses for exact
//! equality, aliases, containment and word-prefix matches are added on top.
//! All functions here are pure and never fail: empty input gives empty
//! output.

use std::collections::HashSet;

use tercih_core::config::MatcherConfig;

use crate::normalizer::TextNormalizer;

// =============================================================================
// Similarity metrics
// =============================================================================

/// A string similarity in `[0, 1]`, 1 meaning identical.
pub trait SimilarityMetric: Send + Sync {
    fn name(&self) -> &'static str;
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Minimum number of single-character edits turning `a` into `b`.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two rows are enough.
    let mut prev_row: Vec<usize> = (0..=b.len()).collect();
    let mut curr_row = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr_row[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr_row[j] = (prev_row[j] + 1)
                .min(curr_row[j - 1] + 1)
                .min(prev_row[j - 1] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b.len()]
}

/// Length of the longest common subsequence of `a` and `b`, in chars.
pub fn lcs_length(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev_row = vec![0usize; b.len() + 1];
    let mut curr_row = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            curr_row[j] = if a[i - 1] == b[j - 1] {
                prev_row[j - 1] + 1
            } else {
                prev_row[j].max(curr_row[j - 1])
            };
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }
    prev_row[b.len()]
}

fn max_char_len(a: &str, b: &str) -> usize {
    a.chars().count().max(b.chars().count())
}

/// `1 - editDistance / maxLen`.
pub struct LevenshteinSimilarity;

impl SimilarityMetric for LevenshteinSimilarity {
    fn name(&self) -> &'static str {
        "levenshtein"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        let max_len = max_char_len(a, b);
        if max_len == 0 {
            return 1.0;
        }
        1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
    }
}

/// Jaccard similarity of the character-bigram sets.
pub struct BigramJaccard;

impl BigramJaccard {
    fn bigrams(s: &str) -> HashSet<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    }
}

impl SimilarityMetric for BigramJaccard {
    fn name(&self) -> &'static str {
        "bigram_jaccard"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a.chars().count() < 2 || b.chars().count() < 2 {
            return if a == b { 1.0 } else { 0.0 };
        }
        let ga = Self::bigrams(a);
        let gb = Self::bigrams(b);
        let union = ga.union(&gb).count();
        if union == 0 {
            return 0.0;
        }
        ga.intersection(&gb).count() as f64 / union as f64
    }
}

/// `lcsLen / maxLen`.
pub struct LcsSimilarity;

impl SimilarityMetric for LcsSimilarity {
    fn name(&self) -> &'static str {
        "lcs"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        let max_len = max_char_len(a, b);
        if max_len == 0 {
            return 1.0;
        }
        lcs_length(a, b) as f64 / max_len as f64
    }
}

// =============================================================================
// Matches
// =============================================================================

/// One searchable string of a candidate item.
#[derive(Debug, Clone, Copy)]
pub struct SearchField<'a> {
    pub value: &'a str,
    pub is_alias: bool,
}

impl<'a> SearchField<'a> {
    pub fn name(value: &'a str) -> Self {
        Self {
            value,
            is_alias: false,
        }
    }

    pub fn alias(value: &'a str) -> Self {
        Self {
            value,
            is_alias: true,
        }
    }
}

/// A candidate that scored at or above the threshold.
#[derive(Debug, Clone)]
pub struct FuzzyMatch<'a, T> {
    pub item: &'a T,
    /// Position of `item` in the input slice.
    pub index: usize,
    /// Final score in `[0, 1]`.
    pub score: f64,
    /// Matching key of the best-scoring field.
    pub matched_key: String,
    pub is_alias: bool,
    /// Query and field keys were identical.
    pub exact: bool,
}

// =============================================================================
// FuzzyMatcher
// =============================================================================

/// Multi-metric fuzzy matcher.
pub struct FuzzyMatcher {
    config: MatcherConfig,
    normalizer: TextNormalizer,
    metrics: Vec<Box<dyn SimilarityMetric>>,
}

impl FuzzyMatcher {
    /// Matcher using Levenshtein, bigram Jaccard and LCS similarity.
    pub fn new(config: MatcherConfig, normalizer: TextNormalizer) -> Self {
        Self::with_metrics(
            config,
            normalizer,
            vec![
                Box::new(LevenshteinSimilarity),
                Box::new(BigramJaccard),
                Box::new(LcsSimilarity),
            ],
        )
    }

    /// Matcher with a custom metric set; the base similarity is their maximum.
    pub fn with_metrics(
        config: MatcherConfig,
        normalizer: TextNormalizer,
        metrics: Vec<Box<dyn SimilarityMetric>>,
    ) -> Self {
        Self {
            config,
            normalizer,
            metrics,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.config.similarity_threshold
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    /// Maximum of all metrics over two matching keys.
    pub fn base_similarity(&self, a: &str, b: &str) -> f64 {
        self.metrics
            .iter()
            .map(|m| m.similarity(a, b))
            .fold(0.0, f64::max)
            .clamp(0.0, 1.0)
    }

    /// Base similarity plus every bonus that applies, unclamped.
    fn raw_score(&self, query_key: &str, candidate_key: &str, is_alias: bool) -> f64 {
        if query_key.is_empty() || candidate_key.is_empty() {
            return 0.0;
        }

        let base = self.base_similarity(query_key, candidate_key);
        let mut score = base;

        if query_key == candidate_key {
            score += self.config.exact_bonus;
        }

        if is_alias {
            score += self.config.alias_bonus;
        }
        if query_key.contains(candidate_key) || candidate_key.contains(query_key) {
            score += self.config.substring_bonus;
        }
        if token_boundary_match(query_key, candidate_key) {
            score += self.config.token_boundary_bonus;
        }

        score
    }

    /// Similarity of two arbitrary strings in `[0, 1]`, bonuses included.
    pub fn similarity_score(&self, a: &str, b: &str) -> f64 {
        let a = self.normalizer.matching_key(a);
        let b = self.normalizer.matching_key(b);
        self.raw_score(&a, &b, false).clamp(0.0, 1.0)
    }

    /// Rank `items` against `query`.
    ///
    /// Each item is scored by its best field (earlier fields win ties);
    /// items below the threshold are dropped; the rest are sorted by
    /// descending score, exact matches first among equal scores, then input
    /// order, and truncated to `limit`.
    pub fn find_matches<'a, T, F>(
        &self,
        query: &str,
        items: &'a [T],
        fields: F,
        limit: usize,
    ) -> Vec<FuzzyMatch<'a, T>>
    where
        F: Fn(&'a T) -> Vec<SearchField<'a>>,
    {
        let query_key = self.normalizer.matching_key(query);
        if query_key.is_empty() || items.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut matches: Vec<FuzzyMatch<'a, T>> = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let mut best: Option<(f64, String, bool)> = None;
            for field in fields(item) {
                let key = self.normalizer.matching_key(field.value);
                let raw = self.raw_score(&query_key, &key, field.is_alias);
                if best.as_ref().map_or(true, |(b, _, _)| raw > *b) {
                    best = Some((raw, key, field.is_alias));
                }
            }

            if let Some((raw, key, is_alias)) = best {
                let score = raw.clamp(0.0, 1.0);
                if score >= self.config.similarity_threshold {
                    matches.push(FuzzyMatch {
                        item,
                        index,
                        score,
                        exact: key == query_key,
                        matched_key: key,
                        is_alias,
                    });
                }
            }
        }

        // Stable: equal (score, exact) keeps input order.
        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.exact.cmp(&a.exact))
        });
        matches.truncate(limit);
        matches
    }
}

/// A word of one key is a prefix of a word of the other.
fn token_boundary_match(a: &str, b: &str) -> bool {
    a.split(' ').filter(|t| t.chars().count() >= 2).any(|ta| {
        b.split(' ')
            .filter(|t| t.chars().count() >= 2)
            .any(|tb| ta.starts_with(tb) || tb.starts_with(ta))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tercih_core::CatalogItem;

    fn matcher() -> FuzzyMatcher {
        FuzzyMatcher::new(MatcherConfig::default(), TextNormalizer::default())
    }

    fn fields(item: &CatalogItem) -> Vec<SearchField<'_>> {
        std::iter::once(SearchField::name(&item.canonical_name))
            .chain(item.aliases.iter().map(|a| SearchField::alias(a)))
            .collect()
    }

    fn universities() -> Vec<CatalogItem> {
        vec![
            CatalogItem::new("İstanbul Teknik Üniversitesi", &["İTÜ"]),
            CatalogItem::new("Orta Doğu Teknik Üniversitesi", &["ODTÜ", "METU"]),
            CatalogItem::new("Boğaziçi Üniversitesi", &["BOUN"]),
            CatalogItem::new("İstanbul Üniversitesi", &["İÜ"]),
            CatalogItem::new("Yıldız Teknik Üniversitesi", &["YTÜ"]),
        ]
    }

    // ---- metrics ----

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("odtu", "odtu"), 0);
    }

    #[test]
    fn test_lcs_length() {
        assert_eq!(lcs_length("abcde", "ace"), 3);
        assert_eq!(lcs_length("", "ace"), 0);
        assert_eq!(lcs_length("bogazici", "bogazici"), 8);
    }

    #[test]
    fn test_metrics_bounded() {
        let metrics: Vec<Box<dyn SimilarityMetric>> = vec![
            Box::new(LevenshteinSimilarity),
            Box::new(BigramJaccard),
            Box::new(LcsSimilarity),
        ];
        let pairs = [("", ""), ("a", ""), ("hacettepe", "hacetepe"), ("x", "yz")];
        for m in &metrics {
            for (a, b) in pairs {
                let s = m.similarity(a, b);
                assert!((0.0..=1.0).contains(&s), "{} out of range for {:?}", m.name(), (a, b));
            }
        }
    }

    #[test]
    fn test_bigram_jaccard_reordering() {
        let s = BigramJaccard.similarity("teknik istanbul", "istanbul teknik");
        assert!(s > 0.6, "got {}", s);
    }

    #[test]
    fn test_bigram_short_strings() {
        assert_eq!(BigramJaccard.similarity("a", "a"), 1.0);
        assert_eq!(BigramJaccard.similarity("a", "ab"), 0.0);
    }

    // ---- similarity score ----

    #[test]
    fn test_similarity_score_diacritics_and_fillers() {
        let m = matcher();
        assert!(m.similarity_score("Boğaziçi Üniversitesi", "Bogazici") >= 0.6);
    }

    #[test]
    fn test_similarity_score_typo() {
        let m = matcher();
        assert!(m.similarity_score("Hacettepe", "Hacetepe") >= 0.8);
    }

    #[test]
    fn test_similarity_score_unrelated_is_low() {
        let m = matcher();
        assert!(m.similarity_score("Ege", "Marmara") < 0.6);
    }

    #[test]
    fn test_self_match_exceeds_threshold_plus_exact_bonus() {
        let m = matcher();
        let config = MatcherConfig::default();
        for name in ["İstanbul Teknik Üniversitesi", "Tıp", "Bilgisayar Mühendisliği"] {
            let normalized = m.normalizer().normalize(name);
            let s = m.similarity_score(name, &normalized);
            assert!(
                s >= (config.similarity_threshold + config.exact_bonus).min(1.0),
                "{} scored {}",
                name,
                s
            );
        }
    }

    #[test]
    fn test_single_word_of_name_reaches_threshold() {
        let m = matcher();
        let items = universities();
        // Base 0.4 on "istanbul teknik"; substring and token-boundary lift it.
        let results = m.find_matches("teknik", &items, fields, 5);
        let itu = results
            .iter()
            .find(|r| r.item.canonical_name == "İstanbul Teknik Üniversitesi")
            .expect("teknik should match");
        assert!((itu.score - 0.65).abs() < 1e-9, "scored {}", itu.score);
        assert!(!itu.exact);
    }

    #[test]
    fn test_alias_bonus_applies_on_weak_base() {
        let m = matcher();
        let items = vec![CatalogItem::new("Orta Doğu Teknik Üniversitesi", &["ODTÜ"])];
        let results = m.find_matches("dogru", &items, fields, 5);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_alias);
        assert!(results[0].score >= m.threshold());
    }

    // ---- find_matches ----

    #[test]
    fn test_find_matches_alias_exact() {
        let m = matcher();
        let items = universities();
        let results = m.find_matches("itu", &items, fields, 5);
        assert!(!results.is_empty());
        assert_eq!(results[0].item.canonical_name, "İstanbul Teknik Üniversitesi");
        assert!(results[0].is_alias);
        assert!(results[0].exact);
        assert!(results[0].score >= 0.8);
    }

    #[test]
    fn test_find_matches_never_below_threshold_and_sorted() {
        let m = matcher();
        let items = universities();
        for query in ["istanbul", "teknik", "bogazci", "odtu", "yildiz", "x"] {
            let results = m.find_matches(query, &items, fields, 10);
            for r in &results {
                assert!(r.score >= m.threshold(), "{} -> {}", query, r.score);
                assert!((0.0..=1.0).contains(&r.score));
            }
            for pair in results.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
        }
    }

    #[test]
    fn test_find_matches_exact_ranks_first() {
        let m = matcher();
        let items = universities();
        let results = m.find_matches("İstanbul Üniversitesi", &items, fields, 5);
        assert_eq!(results[0].item.canonical_name, "İstanbul Üniversitesi");
    }

    #[test]
    fn test_exact_wins_among_saturated_scores() {
        let m = matcher();
        // Both saturate at 1.0; only the second is an exact match.
        let items = vec![
            CatalogItem::new("Fizikçi", &["Fizikçi"]),
            CatalogItem::new("Fizik", &[]),
        ];
        let results = m.find_matches("fizik", &items, fields, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].score, 1.0);
        assert_eq!(results[0].item.canonical_name, "Fizik");
        assert!(results[0].exact);
        assert!(!results[1].exact);
    }

    #[test]
    fn test_find_matches_ties_keep_input_order() {
        let m = matcher();
        let items = vec![
            CatalogItem::new("Fizik", &[]),
            CatalogItem::new("Fizik", &[]),
            CatalogItem::new("Fizik", &[]),
        ];
        let results = m.find_matches("fizik", &items, fields, 5);
        let order: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_find_matches_limit() {
        let m = matcher();
        let items = universities();
        let results = m.find_matches("teknik", &items, fields, 1);
        assert!(results.len() <= 1);
        assert!(m.find_matches("teknik", &items, fields, 0).is_empty());
    }

    #[test]
    fn test_find_matches_empty_inputs() {
        let m = matcher();
        let items = universities();
        assert!(m.find_matches("", &items, fields, 5).is_empty());
        assert!(m.find_matches("   ?! ", &items, fields, 5).is_empty());
        let none: Vec<CatalogItem> = vec![];
        assert!(m.find_matches("itu", &none, fields, 5).is_empty());
    }

    #[test]
    fn test_custom_metric_set() {
        struct Never;
        impl SimilarityMetric for Never {
            fn name(&self) -> &'static str {
                "never"
            }
            fn similarity(&self, _a: &str, _b: &str) -> f64 {
                0.0
            }
        }
        let m = FuzzyMatcher::with_metrics(
            MatcherConfig::default(),
            TextNormalizer::default(),
            vec![Box::new(Never)],
        );
        let items = universities();
        // Bonuses alone: exact + alias + substring + token boundary.
        let results = m.find_matches("itu", &items, fields, 5);
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.75).abs() < 1e-9);
        // No shared token and no bonus: nothing.
        assert!(m.find_matches("zzz", &items, fields, 5).is_empty());
    }
}
