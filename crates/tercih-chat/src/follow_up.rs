//! Follow-up suggestions.
//!
//! Produces ranked next steps for a turn: a help path when the user repeats
//! themselves or sounds confused, clarification questions for missing
//! entities, then intent-specific suggestions. Output is sorted by
//! descending priority; equal priorities keep generation order.

use tercih_core::{EntityKind, EntityMap, Intent};

use crate::normalizer::normalize;
use crate::types::{FollowUp, FollowUpKind};

/// Priority of clarification questions for missing entities.
const CLARIFICATION_PRIORITY: u8 = 7;

/// Suggestion text may contain `{university}` / `{department}`; templates
/// whose placeholders cannot be filled are skipped.
#[derive(Debug, Clone)]
pub struct FollowUpTemplate {
    pub kind: FollowUpKind,
    pub text: String,
    pub target_intent: Option<Intent>,
    pub target_entities: Vec<EntityKind>,
    pub priority: u8,
}

impl FollowUpTemplate {
    fn new(kind: FollowUpKind, text: &str, priority: u8) -> Self {
        Self {
            kind,
            text: text.to_string(),
            target_intent: None,
            target_entities: Vec::new(),
            priority,
        }
    }

    fn targeting(mut self, intent: Intent) -> Self {
        self.target_intent = Some(intent);
        self
    }

    fn about(mut self, kind: EntityKind) -> Self {
        self.target_entities.push(kind);
        self
    }

    fn render(&self, entities: &EntityMap) -> Option<FollowUp> {
        let mut text = self.text.clone();
        for kind in [EntityKind::University, EntityKind::Department] {
            let placeholder = format!("{{{}}}", kind.as_str());
            if text.contains(&placeholder) {
                let value = entities.get(&kind).and_then(|v| v.as_text())?;
                text = text.replace(&placeholder, value);
            }
        }
        Some(FollowUp {
            kind: self.kind,
            text,
            target_intent: self.target_intent,
            target_entities: self.target_entities.clone(),
            priority: self.priority,
        })
    }
}

/// Template tables for the handler.
#[derive(Debug, Clone)]
pub struct FollowUpTemplates {
    per_intent: Vec<(Intent, Vec<FollowUpTemplate>)>,
    help: Vec<FollowUpTemplate>,
    /// Normalized phrases signalling confusion.
    confusion_phrases: Vec<String>,
}

impl FollowUpTemplates {
    pub fn for_intent(&self, intent: Intent) -> &[FollowUpTemplate] {
        self.per_intent
            .iter()
            .find(|(i, _)| *i == intent)
            .map(|(_, t)| t.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for FollowUpTemplates {
    fn default() -> Self {
        use FollowUpKind::*;
        let t = FollowUpTemplate::new;

        let per_intent = vec![
            (
                Intent::NetCalculation,
                vec![
                    t(
                        Question,
                        "Hedeflediğiniz bir puan var mı? Söylerseniz gereken neti birlikte hesaplayalım.",
                        5,
                    )
                    .targeting(Intent::NetCalculation),
                    t(
                        Action,
                        "{university} için farklı bir puan türüyle de hesaplayabilirim.",
                        4,
                    )
                    .about(EntityKind::ScoreType),
                    t(
                        Information,
                        "Net, doğru sayısından yanlışların dörtte biri çıkarılarak bulunur.",
                        3,
                    ),
                ],
            ),
            (
                Intent::TytCalculation,
                vec![
                    t(Question, "AYT sonuçlarınızı da paylaşır mısınız?", 5)
                        .targeting(Intent::AytCalculation)
                        .about(EntityKind::AytScores),
                    t(Information, "Her 4 yanlış 1 doğruyu götürür.", 3),
                ],
            ),
            (
                Intent::AytCalculation,
                vec![
                    t(Question, "TYT sonuçlarınızı da paylaşır mısınız?", 5)
                        .targeting(Intent::TytCalculation)
                        .about(EntityKind::TytScores),
                    t(Information, "Her 4 yanlış 1 doğruyu götürür.", 3),
                ],
            ),
            (
                Intent::BaseScore,
                vec![
                    t(
                        Action,
                        "{university} {department} kontenjanına da bakabilirim.",
                        5,
                    )
                    .targeting(Intent::QuotaInquiry),
                    t(Question, "Başka bir üniversiteyle karşılaştırmak ister misiniz?", 4)
                        .about(EntityKind::University),
                ],
            ),
            (
                Intent::QuotaInquiry,
                vec![
                    t(
                        Action,
                        "{university} {department} taban puanını da göstereyim mi?",
                        5,
                    )
                    .targeting(Intent::BaseScore),
                    t(Question, "Başka bir bölümün kontenjanını da sormak ister misiniz?", 4)
                        .about(EntityKind::Department),
                ],
            ),
            (
                Intent::DepartmentSearch,
                vec![
                    t(Question, "{university} bünyesinde ilgilendiğiniz bir alan var mı?", 5)
                        .about(EntityKind::Department),
                    t(Action, "Bir bölümün taban puanını sorabilirsiniz.", 4)
                        .targeting(Intent::BaseScore),
                ],
            ),
            (
                Intent::UniversityInfo,
                vec![
                    t(Action, "{university} bölümlerini listeleyebilirim.", 5)
                        .targeting(Intent::DepartmentSearch),
                    t(Question, "Hangi bölümle ilgileniyorsunuz?", 4).about(EntityKind::Department),
                ],
            ),
            (
                Intent::StudyAdvice,
                vec![
                    t(
                        Information,
                        "Düzenli deneme çözmek gelişiminizi takip etmenin en iyi yoludur.",
                        4,
                    ),
                    t(Action, "Netlerinizi yazarsanız hesaplayabilirim.", 3)
                        .targeting(Intent::NetCalculation),
                ],
            ),
            (
                Intent::Greeting,
                vec![t(
                    Question,
                    "Taban puan, kontenjan ya da net hesabı konusunda yardımcı olabilirim. Ne öğrenmek istersiniz?",
                    5,
                )],
            ),
            (
                Intent::Thanks,
                vec![t(Question, "Başka bir konuda yardımcı olabilir miyim?", 5)],
            ),
            (
                Intent::Completed,
                vec![t(
                    Information,
                    "Başarılar dilerim! İstediğiniz zaman yeniden yazabilirsiniz.",
                    5,
                )],
            ),
            (
                Intent::General,
                vec![t(
                    Question,
                    "Bir üniversite ya da bölüm adı yazarak başlayabilirsiniz.",
                    4,
                )],
            ),
            (
                Intent::ClarificationNeeded,
                vec![
                    t(Question, "Sorunuzu biraz daha açar mısınız?", 5),
                    t(
                        Information,
                        "Örneğin: \"ODTÜ bilgisayar mühendisliği taban puanı\"",
                        4,
                    ),
                ],
            ),
        ];

        let help = vec![
            t(
                Information,
                "Sorunuzu farklı kelimelerle yazmayı deneyin; üniversite ve bölüm adını birlikte belirtmek işe yarar.",
                9,
            ),
            t(
                Action,
                "Örnek bir soru: \"İTÜ bilgisayar mühendisliği taban puanı\"",
                8,
            ),
        ];

        let confusion_phrases = [
            "anlamadım",
            "anlamıyorum",
            "ne demek",
            "kafam karıştı",
            "yardım",
        ]
        .iter()
        .map(|p| normalize(p))
        .collect();

        Self {
            per_intent,
            help,
            confusion_phrases,
        }
    }
}

// =============================================================================
// FollowUpHandler
// =============================================================================

/// What the handler needs to know about the current turn.
#[derive(Debug, Clone, Copy)]
pub struct FollowUpInput<'a> {
    pub intent: Intent,
    /// Accumulated entities.
    pub entities: &'a EntityMap,
    /// Missing required entities, in table order.
    pub missing: &'a [EntityKind],
    /// Clarification questions, parallel to the first entries of `missing`.
    pub clarifications: &'a [String],
    pub normalized_message: &'a str,
    pub is_repeating: bool,
}

/// Generates ranked follow-ups.
pub struct FollowUpHandler {
    templates: FollowUpTemplates,
}

impl FollowUpHandler {
    pub fn new(templates: FollowUpTemplates) -> Self {
        Self { templates }
    }

    /// Whether the message contains a confusion phrase.
    pub fn is_confused(&self, normalized_message: &str) -> bool {
        let padded = format!(" {} ", normalized_message);
        self.templates
            .confusion_phrases
            .iter()
            .any(|p| padded.contains(&format!(" {}", p)))
    }

    pub fn generate(&self, input: &FollowUpInput<'_>) -> Vec<FollowUp> {
        let mut out = Vec::new();

        if input.is_repeating || self.is_confused(input.normalized_message) {
            out.extend(
                self.templates
                    .help
                    .iter()
                    .filter_map(|t| t.render(input.entities)),
            );
        }

        for (kind, question) in input.missing.iter().zip(input.clarifications) {
            out.push(FollowUp {
                kind: FollowUpKind::Question,
                text: question.clone(),
                target_intent: Some(input.intent),
                target_entities: vec![*kind],
                priority: CLARIFICATION_PRIORITY,
            });
        }

        out.extend(
            self.templates
                .for_intent(input.intent)
                .iter()
                .filter_map(|t| t.render(input.entities)),
        );

        // Stable: equal priorities keep generation order.
        out.sort_by(|a, b| b.priority.cmp(&a.priority));
        out
    }
}

impl Default for FollowUpHandler {
    fn default() -> Self {
        Self::new(FollowUpTemplates::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(
        intent: Intent,
        entities: &'a EntityMap,
        missing: &'a [EntityKind],
        clarifications: &'a [String],
        message: &'a str,
        is_repeating: bool,
    ) -> FollowUpInput<'a> {
        FollowUpInput {
            intent,
            entities,
            missing,
            clarifications,
            normalized_message: message,
            is_repeating,
        }
    }

    fn sorted_desc(items: &[FollowUp]) -> bool {
        items.windows(2).all(|w| w[0].priority >= w[1].priority)
    }

    #[test]
    fn test_intent_templates_with_entities() {
        let handler = FollowUpHandler::default();
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::University, "Ege Üniversitesi".into());
        entities.insert(EntityKind::Department, "Tıp".into());

        let out = handler.generate(&input(Intent::BaseScore, &entities, &[], &[], "", false));
        assert_eq!(out[0].text, "Ege Üniversitesi Tıp kontenjanına da bakabilirim.");
        assert_eq!(out[0].target_intent, Some(Intent::QuotaInquiry));
        assert!(sorted_desc(&out));
    }

    #[test]
    fn test_unfilled_placeholders_are_skipped() {
        let handler = FollowUpHandler::default();
        let entities = EntityMap::new();
        let out = handler.generate(&input(Intent::UniversityInfo, &entities, &[], &[], "", false));
        assert!(out.iter().all(|f| !f.text.contains('{')));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_clarifications_rank_above_intent_suggestions() {
        let handler = FollowUpHandler::default();
        let entities = EntityMap::new();
        let missing = [EntityKind::University, EntityKind::Department];
        let questions = vec!["Hangi üniversite?".to_string(), "Hangi bölüm?".to_string()];
        let out = handler.generate(&input(
            Intent::BaseScore,
            &entities,
            &missing,
            &questions,
            "taban puan",
            false,
        ));
        assert_eq!(out[0].text, "Hangi üniversite?");
        assert_eq!(out[0].kind, FollowUpKind::Question);
        assert_eq!(out[0].target_entities, vec![EntityKind::University]);
        // Stable on equal priority.
        assert_eq!(out[1].text, "Hangi bölüm?");
        assert!(sorted_desc(&out));
    }

    #[test]
    fn test_help_path_on_repetition() {
        let handler = FollowUpHandler::default();
        let entities = EntityMap::new();
        let out = handler.generate(&input(Intent::General, &entities, &[], &[], "x", true));
        assert_eq!(out[0].priority, 9);
        assert_eq!(out[0].kind, FollowUpKind::Information);
    }

    #[test]
    fn test_help_path_on_confusion() {
        let handler = FollowUpHandler::default();
        let entities = EntityMap::new();
        let message = normalize("Anlamadım, ne demek bu?");
        assert!(handler.is_confused(&message));
        let out = handler.generate(&input(
            Intent::ClarificationNeeded,
            &entities,
            &[],
            &[],
            &message,
            false,
        ));
        assert_eq!(out[0].priority, 9);
        assert!(sorted_desc(&out));
    }

    #[test]
    fn test_no_help_for_plain_message() {
        let handler = FollowUpHandler::default();
        assert!(!handler.is_confused("odtu taban puani"));
    }
}
