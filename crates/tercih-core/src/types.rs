use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Intent
// =============================================================================

/// What the user wants from the assistant.
///
/// The declaration order doubles as the classifier's final tie-break:
/// calculation intents come first, social intents last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Net score needed/achieved for a university program.
    NetCalculation,
    /// TYT (basic proficiency) net calculation.
    TytCalculation,
    /// AYT (field proficiency) net calculation.
    AytCalculation,
    /// Base (minimum) admission score of a program.
    BaseScore,
    /// Admission quota of a program.
    QuotaInquiry,
    /// Listing departments of a university.
    DepartmentSearch,
    /// General information about a university.
    UniversityInfo,
    /// Study advice and motivation.
    StudyAdvice,
    /// User is closing the conversation.
    Completed,
    /// Gratitude.
    Thanks,
    /// Salutation.
    Greeting,
    /// Fallback when nothing specific was recognized.
    General,
    /// Fallback when the user asked something we could not place.
    ClarificationNeeded,
    /// Reserved for the fallback envelope after an internal fault.
    Error,
}

impl Intent {
    /// Intents that own a keyword table, in tie-break order.
    pub const CLASSIFIABLE: [Intent; 11] = [
        Intent::NetCalculation,
        Intent::TytCalculation,
        Intent::AytCalculation,
        Intent::BaseScore,
        Intent::QuotaInquiry,
        Intent::DepartmentSearch,
        Intent::UniversityInfo,
        Intent::StudyAdvice,
        Intent::Completed,
        Intent::Thanks,
        Intent::Greeting,
    ];

    /// Wire label of the intent.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::NetCalculation => "net_calculation",
            Intent::TytCalculation => "tyt_calculation",
            Intent::AytCalculation => "ayt_calculation",
            Intent::BaseScore => "base_score",
            Intent::QuotaInquiry => "quota_inquiry",
            Intent::DepartmentSearch => "department_search",
            Intent::UniversityInfo => "university_info",
            Intent::StudyAdvice => "study_advice",
            Intent::Completed => "completed",
            Intent::Thanks => "thanks",
            Intent::Greeting => "greeting",
            Intent::General => "general",
            Intent::ClarificationNeeded => "clarification_needed",
            Intent::Error => "error",
        }
    }

    /// Intents that benefit from numeric tokens in the message.
    pub fn is_calculation(&self) -> bool {
        matches!(
            self,
            Intent::NetCalculation | Intent::TytCalculation | Intent::AytCalculation
        )
    }

    /// Intents that are typically phrased as questions.
    pub fn is_inquiry(&self) -> bool {
        matches!(
            self,
            Intent::BaseScore
                | Intent::QuotaInquiry
                | Intent::DepartmentSearch
                | Intent::UniversityInfo
                | Intent::NetCalculation
        )
    }

    /// Whether the intent is one of the fallbacks rather than a recognized request.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            Intent::General | Intent::ClarificationNeeded | Intent::Error
        )
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Key of an accumulated entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    University,
    Department,
    ScoreType,
    Language,
    TytScores,
    AytScores,
    /// Numbers that could not be tied to a subject.
    Numbers,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::University => "university",
            EntityKind::Department => "department",
            EntityKind::ScoreType => "scoreType",
            EntityKind::Language => "language",
            EntityKind::TytScores => "tytScores",
            EntityKind::AytScores => "aytScores",
            EntityKind::Numbers => "numbers",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// National exam stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamStage {
    Tyt,
    Ayt,
}

impl ExamStage {
    /// Entity key under which this stage's subject counts are accumulated.
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            ExamStage::Tyt => EntityKind::TytScores,
            ExamStage::Ayt => EntityKind::AytScores,
        }
    }
}

/// Exam subject.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Turkish,
    Mathematics,
    Science,
    Social,
    Physics,
    Chemistry,
    Biology,
    Literature,
    History,
    Geography,
    Philosophy,
}

impl Subject {
    /// Turkish display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Subject::Turkish => "Türkçe",
            Subject::Mathematics => "Matematik",
            Subject::Science => "Fen Bilimleri",
            Subject::Social => "Sosyal Bilimler",
            Subject::Physics => "Fizik",
            Subject::Chemistry => "Kimya",
            Subject::Biology => "Biyoloji",
            Subject::Literature => "Edebiyat",
            Subject::History => "Tarih",
            Subject::Geography => "Coğrafya",
            Subject::Philosophy => "Felsefe",
        }
    }
}

/// Correct/wrong answer counts for one subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCounts {
    pub correct: u32,
    pub wrong: u32,
    /// `true` when `wrong` was derived from the subject's question count.
    #[serde(default)]
    pub wrong_inferred: bool,
}

/// Per-subject counts for one exam stage.
pub type ExamResults = BTreeMap<Subject, SubjectCounts>;

/// Value of an accumulated entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityValue {
    Text(String),
    Numbers(Vec<f64>),
    Exam(ExamResults),
}

impl EntityValue {
    /// Empty values count as absent and never overwrite accumulated ones.
    pub fn is_empty(&self) -> bool {
        match self {
            EntityValue::Text(s) => s.trim().is_empty(),
            EntityValue::Numbers(n) => n.is_empty(),
            EntityValue::Exam(e) => e.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            EntityValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_exam(&self) -> Option<&ExamResults> {
        match self {
            EntityValue::Exam(e) => Some(e),
            _ => None,
        }
    }
}

impl From<&str> for EntityValue {
    fn from(s: &str) -> Self {
        EntityValue::Text(s.to_string())
    }
}

impl From<String> for EntityValue {
    fn from(s: String) -> Self {
        EntityValue::Text(s)
    }
}

/// Accumulated entities of a session, keyed by kind.
pub type EntityMap = BTreeMap<EntityKind, EntityValue>;

// =============================================================================
// Conversation state
// =============================================================================

/// Slot-filling progress of a session. Ordered: states only move forward.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Initial,
    GatheringInfo,
    Processing,
    Completed,
}

// =============================================================================
// Reference catalog
// =============================================================================

/// One entry of a reference catalog (university or department).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub canonical_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl CatalogItem {
    pub fn new(canonical_name: &str, aliases: &[&str]) -> Self {
        Self {
            canonical_name: canonical_name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}
