//! Response rendering.
//!
//! Turns an intent and the accumulated entities into user-facing Turkish
//! text. Scores and nets themselves come from outside the engine; the
//! default renderer only acknowledges what it knows and asks for the rest.

use tercih_core::{EntityKind, EntityMap, ExamResults, ExamStage, Intent};

use crate::error::ChatError;

/// Renders the message of a turn from structured input only.
pub trait ResponseRenderer: Send + Sync {
    fn render(&self, intent: Intent, entities: &EntityMap) -> Result<String, ChatError>;
}

// =============================================================================
// TemplateRenderer
// =============================================================================

/// Built-in template renderer.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ResponseRenderer for TemplateRenderer {
    fn render(&self, intent: Intent, entities: &EntityMap) -> Result<String, ChatError> {
        let text = |kind: EntityKind| entities.get(&kind).and_then(|v| v.as_text());
        let university = text(EntityKind::University);
        let department = text(EntityKind::Department);
        let score_type = text(EntityKind::ScoreType);

        let message = match intent {
            Intent::NetCalculation => {
                let mut parts = Vec::new();
                match (university, department) {
                    (Some(u), Some(d)) => {
                        let target = match score_type {
                            Some(st) => format!("{} {} ({})", u, d, st),
                            None => format!("{} {}", u, d),
                        };
                        parts.push(format!("{} için gereken net hesabını hazırlıyorum.", target));
                    }
                    _ => parts.push(
                        "Net hesabı için hedeflediğiniz üniversite ve bölümü bilmem gerekiyor."
                            .to_string(),
                    ),
                }
                parts.extend(exam_summaries(entities));
                parts.join(" ")
            }
            Intent::TytCalculation | Intent::AytCalculation => {
                let summaries = exam_summaries(entities);
                if summaries.is_empty() {
                    "Ders bazında doğru ve yanlış sayılarınızı yazar mısınız? (ör. matematik 30 doğru 5 yanlış)".to_string()
                } else {
                    format!("Sonuçlarınızı aldım. {}", summaries.join(" "))
                }
            }
            Intent::BaseScore => match (university, department) {
                (Some(u), Some(d)) => format!("{} {} taban puanı bilgisini getiriyorum.", u, d),
                (Some(u), None) => {
                    format!("{} için hangi bölümün taban puanını öğrenmek istersiniz?", u)
                }
                (None, Some(d)) => {
                    format!("{} için hangi üniversitenin taban puanını öğrenmek istersiniz?", d)
                }
                (None, None) => {
                    "Hangi üniversite ve bölümün taban puanını öğrenmek istersiniz?".to_string()
                }
            },
            Intent::QuotaInquiry => match (university, department) {
                (Some(u), Some(d)) => format!("{} {} kontenjan bilgisini getiriyorum.", u, d),
                _ => "Kontenjan bilgisi için üniversite ve bölüm adını yazar mısınız?".to_string(),
            },
            Intent::DepartmentSearch => match university {
                Some(u) => format!("{} bünyesindeki bölümleri listeliyorum.", u),
                None => "Hangi üniversitenin bölümlerini görmek istersiniz?".to_string(),
            },
            Intent::UniversityInfo => match university {
                Some(u) => format!("{} hakkında bilgi hazırlıyorum.", u),
                None => "Hangi üniversite hakkında bilgi almak istersiniz?".to_string(),
            },
            Intent::StudyAdvice => {
                "Düzenli bir çalışma programı ve haftalık denemeler en büyük farkı yaratır. Eksik olduğunuz dersleri belirleyip onlara öncelik verin.".to_string()
            }
            Intent::Completed => "Görüşmek üzere, sınavda başarılar!".to_string(),
            Intent::Thanks => "Rica ederim! Başka bir sorunuz olursa buradayım.".to_string(),
            Intent::Greeting => {
                "Merhaba! Üniversite tercihlerinizle ilgili size nasıl yardımcı olabilirim?".to_string()
            }
            Intent::General => {
                "Size üniversiteler, bölümler, taban puanlar ve net hesabı konusunda yardımcı olabilirim.".to_string()
            }
            Intent::ClarificationNeeded => {
                "Sorunuzu tam anlayamadım. Biraz daha ayrıntı verebilir misiniz?".to_string()
            }
            Intent::Error => {
                return Err(ChatError::Render(
                    "the error intent has no template".to_string(),
                ))
            }
        };
        Ok(message)
    }
}

fn stage_label(stage: ExamStage) -> &'static str {
    match stage {
        ExamStage::Tyt => "TYT",
        ExamStage::Ayt => "AYT",
    }
}

fn exam_summary(stage: ExamStage, results: &ExamResults) -> String {
    let subjects: Vec<String> = results
        .iter()
        .map(|(subject, counts)| {
            let mut s = format!(
                "{} {} doğru {} yanlış",
                subject.display_name(),
                counts.correct,
                counts.wrong
            );
            if counts.wrong_inferred {
                s.push_str(" (boşlar yanlış sayıldı)");
            }
            s
        })
        .collect();
    format!("{}: {}.", stage_label(stage), subjects.join(", "))
}

fn exam_summaries(entities: &EntityMap) -> Vec<String> {
    [ExamStage::Tyt, ExamStage::Ayt]
        .into_iter()
        .filter_map(|stage| {
            entities
                .get(&stage.entity_kind())
                .and_then(|v| v.as_exam())
                .filter(|r| !r.is_empty())
                .map(|r| exam_summary(stage, r))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tercih_core::{EntityValue, Subject, SubjectCounts};

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new()
    }

    #[test]
    fn test_base_score_full() {
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::University, "Ege Üniversitesi".into());
        entities.insert(EntityKind::Department, "Tıp".into());
        let message = renderer().render(Intent::BaseScore, &entities).unwrap();
        assert_eq!(message, "Ege Üniversitesi Tıp taban puanı bilgisini getiriyorum.");
    }

    #[test]
    fn test_base_score_partial_asks_for_rest() {
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::University, "Ege Üniversitesi".into());
        let message = renderer().render(Intent::BaseScore, &entities).unwrap();
        assert!(message.contains("hangi bölümün"));
    }

    #[test]
    fn test_exam_summary() {
        let mut exam = ExamResults::new();
        exam.insert(
            Subject::Mathematics,
            SubjectCounts {
                correct: 35,
                wrong: 5,
                wrong_inferred: false,
            },
        );
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::TytScores, EntityValue::Exam(exam));
        let message = renderer()
            .render(Intent::TytCalculation, &entities)
            .unwrap();
        assert!(message.contains("TYT: Matematik 35 doğru 5 yanlış."));
    }

    #[test]
    fn test_every_dialogue_intent_renders() {
        let entities = EntityMap::new();
        for intent in Intent::CLASSIFIABLE
            .into_iter()
            .chain([Intent::General, Intent::ClarificationNeeded])
        {
            let message = renderer().render(intent, &entities).unwrap();
            assert!(!message.is_empty(), "{}", intent);
        }
    }

    #[test]
    fn test_error_intent_is_not_rendered() {
        let err = renderer()
            .render(Intent::Error, &EntityMap::new())
            .unwrap_err();
        assert!(matches!(err, ChatError::Render(_)));
    }
}
