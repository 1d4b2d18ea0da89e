use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use tercih_core::{ConversationState, EntityKind, EntityMap, EntityValue, Intent};

// =============================================================================
// Classification / extraction results
// =============================================================================

/// Outcome of intent classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: Intent,
    /// Monotone in `score`, within `[0, 1]`.
    pub confidence: f64,
    /// Keywords/phrases that contributed to the winning intent.
    pub evidence: Vec<String>,
    /// Total weighted evidence of the winner, modifiers included.
    pub score: f64,
}

/// Token range `[start, end)` of the prepared message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// One extracted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    pub kind: EntityKind,
    /// Canonical value (catalog name, score-type code, counts...).
    pub value: EntityValue,
    pub confidence: f64,
    pub span: Span,
    /// Normalized text the match was made on.
    pub matched_text: String,
}

// =============================================================================
// Session context
// =============================================================================

/// One processed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEntry {
    /// Epoch seconds.
    pub timestamp: i64,
    pub intent: Intent,
    /// Entities extracted in this turn only.
    pub entities: EntityMap,
    pub message: String,
    pub normalized_message: String,
    pub bot_response: Option<String>,
}

/// Accumulated state of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub user_id: String,
    /// Most recent turn last; bounded by the configured capacity.
    pub history: VecDeque<TurnEntry>,
    pub entities: EntityMap,
    pub state: ConversationState,
    pub current_intent: Option<Intent>,
    /// Epoch seconds.
    pub created_at: i64,
    /// Epoch seconds.
    pub last_activity: i64,
    pub turn_count: u64,
}

impl SessionContext {
    /// Intent of the most recent turn.
    pub fn previous_intent(&self) -> Option<Intent> {
        self.history.back().map(|t| t.intent)
    }
}

// =============================================================================
// Follow-ups
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpKind {
    Question,
    Action,
    Information,
}

/// A suggested next step for the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    #[serde(rename = "type")]
    pub kind: FollowUpKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_entities: Vec<EntityKind>,
    /// Higher first.
    pub priority: u8,
}

// =============================================================================
// Response envelope
// =============================================================================

/// Per-turn result handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub intent: Intent,
    /// The full accumulated set, not just this turn's.
    pub entities: EntityMap,
    pub confidence: f64,
    pub message: String,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_needed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_questions: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_shape() {
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::University, "Ege Üniversitesi".into());
        let envelope = ResponseEnvelope {
            intent: Intent::BaseScore,
            entities,
            confidence: 0.75,
            message: "Hangi bölüm?".to_string(),
            suggestions: vec!["Bölüm adını yazın".to_string()],
            clarification_needed: Some(true),
            follow_up_questions: None,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["intent"], "base_score");
        assert_eq!(json["entities"]["university"], "Ege Üniversitesi");
        assert_eq!(json["clarificationNeeded"], true);
        assert!(json.get("followUpQuestions").is_none());
    }

    #[test]
    fn test_follow_up_wire_shape() {
        let follow_up = FollowUp {
            kind: FollowUpKind::Question,
            text: "Hangi üniversite?".to_string(),
            target_intent: None,
            target_entities: vec![EntityKind::University],
            priority: 3,
        };
        let json = serde_json::to_value(&follow_up).unwrap();
        assert_eq!(json["type"], "question");
        assert_eq!(json["targetEntities"][0], "university");
        assert!(json.get("targetIntent").is_none());
    }

    #[test]
    fn test_previous_intent_is_last_turn() {
        let turn = |intent| TurnEntry {
            timestamp: 0,
            intent,
            entities: EntityMap::new(),
            message: String::new(),
            normalized_message: String::new(),
            bot_response: None,
        };
        let mut ctx = SessionContext {
            session_id: "s".to_string(),
            user_id: "u".to_string(),
            history: VecDeque::new(),
            entities: EntityMap::new(),
            state: ConversationState::Initial,
            current_intent: None,
            created_at: 0,
            last_activity: 0,
            turn_count: 0,
        };
        assert_eq!(ctx.previous_intent(), None);
        ctx.history.push_back(turn(Intent::Greeting));
        ctx.history.push_back(turn(Intent::BaseScore));
        assert_eq!(ctx.previous_intent(), Some(Intent::BaseScore));
    }
}
