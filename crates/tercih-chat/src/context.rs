//! Conversation context management.
//!
//! Accumulates entities across turns, keeps a bounded turn history, and
//! drives the per-session state machine:
//!
//! - `initial -> gathering_info` after the first processed turn,
//! - `gathering_info -> processing` once the intent's required entities are
//!   all known,
//! - `-> completed` on a closing intent, or when the required entities are
//!   known and more than one turn has happened.
//!
//! States never move backward except through [`ConversationManager::reset`].

use std::collections::VecDeque;

use chrono::Utc;
use tracing::debug;

use tercih_core::config::SessionConfig;
use tercih_core::{ConversationState, EntityKind, EntityMap, EntityValue, Intent};

use crate::types::{SessionContext, TurnEntry};

// =============================================================================
// Static tables
// =============================================================================

/// Entities an intent needs before it can be answered.
///
/// Intents without an entry do no slot filling.
#[derive(Debug, Clone)]
pub struct RequiredEntities {
    table: Vec<(Intent, Vec<EntityKind>)>,
}

impl RequiredEntities {
    pub fn new(table: Vec<(Intent, Vec<EntityKind>)>) -> Self {
        Self { table }
    }

    pub fn get(&self, intent: Intent) -> Option<&[EntityKind]> {
        self.table
            .iter()
            .find(|(i, _)| *i == intent)
            .map(|(_, kinds)| kinds.as_slice())
    }

    /// Whether the intent collects entities over several turns.
    pub fn is_slot_filling(&self, intent: Intent) -> bool {
        self.get(intent).is_some_and(|kinds| !kinds.is_empty())
    }
}

impl Default for RequiredEntities {
    fn default() -> Self {
        use EntityKind::*;
        Self::new(vec![
            (Intent::NetCalculation, vec![University, Department, ScoreType]),
            (Intent::BaseScore, vec![University, Department]),
            (Intent::QuotaInquiry, vec![University, Department]),
            (Intent::DepartmentSearch, vec![University]),
            (Intent::ClarificationNeeded, vec![]),
        ])
    }
}

/// Canned questions for missing entities, keyed by (intent, entity) with a
/// per-entity fallback.
#[derive(Debug, Clone)]
pub struct ClarificationTemplates {
    specific: Vec<((Intent, EntityKind), String)>,
    generic: Vec<(EntityKind, String)>,
}

impl ClarificationTemplates {
    pub fn new(
        specific: Vec<((Intent, EntityKind), String)>,
        generic: Vec<(EntityKind, String)>,
    ) -> Self {
        Self { specific, generic }
    }

    pub fn question(&self, intent: Intent, kind: EntityKind) -> Option<&str> {
        self.specific
            .iter()
            .find(|(key, _)| *key == (intent, kind))
            .map(|(_, q)| q.as_str())
            .or_else(|| {
                self.generic
                    .iter()
                    .find(|(k, _)| *k == kind)
                    .map(|(_, q)| q.as_str())
            })
    }
}

impl Default for ClarificationTemplates {
    fn default() -> Self {
        use EntityKind::*;
        let specific = [
            (
                (Intent::NetCalculation, University),
                "Hangi üniversite için net hesaplamak istiyorsunuz?",
            ),
            (
                (Intent::NetCalculation, Department),
                "Hangi bölümü hedefliyorsunuz?",
            ),
            (
                (Intent::NetCalculation, ScoreType),
                "Hangi puan türüyle hesaplayalım? (SAY, EA, SÖZ, DİL)",
            ),
            (
                (Intent::BaseScore, University),
                "Hangi üniversitenin taban puanını öğrenmek istiyorsunuz?",
            ),
            (
                (Intent::BaseScore, Department),
                "Hangi bölümün taban puanını merak ediyorsunuz?",
            ),
            (
                (Intent::QuotaInquiry, University),
                "Hangi üniversitenin kontenjanını soruyorsunuz?",
            ),
            (
                (Intent::QuotaInquiry, Department),
                "Hangi bölümün kontenjanını öğrenmek istiyorsunuz?",
            ),
            (
                (Intent::DepartmentSearch, University),
                "Hangi üniversitenin bölümlerini listeleyeyim?",
            ),
        ]
        .into_iter()
        .map(|(k, q)| (k, q.to_string()))
        .collect();

        let generic = [
            (University, "Hangi üniversiteyi kastediyorsunuz?"),
            (Department, "Hangi bölümü kastediyorsunuz?"),
            (ScoreType, "Hangi puan türünü kastediyorsunuz? (SAY, EA, SÖZ, DİL)"),
            (Language, "Hangi eğitim dilini tercih ediyorsunuz?"),
            (
                TytScores,
                "TYT sonuçlarınızı ders ders yazar mısınız? (ör. matematik 30 doğru 5 yanlış)",
            ),
            (
                AytScores,
                "AYT sonuçlarınızı ders ders yazar mısınız? (ör. fizik 10 doğru 2 yanlış)",
            ),
            (Numbers, "Hangi sayıyı kastettiğinizi biraz açar mısınız?"),
        ]
        .into_iter()
        .map(|(k, q)| (k, q.to_string()))
        .collect();

        Self::new(specific, generic)
    }
}

// =============================================================================
// ConversationManager
// =============================================================================

/// Operations on a single session's context.
///
/// Holds no sessions itself; callers serialize access per session.
pub struct ConversationManager {
    config: SessionConfig,
    required: RequiredEntities,
    templates: ClarificationTemplates,
}

impl ConversationManager {
    pub fn new(
        config: SessionConfig,
        required: RequiredEntities,
        templates: ClarificationTemplates,
    ) -> Self {
        Self {
            config,
            required,
            templates,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn required(&self) -> &RequiredEntities {
        &self.required
    }

    /// Create a fresh session in the `initial` state.
    pub fn create_session(&self, session_id: &str, user_id: &str) -> SessionContext {
        let now = Utc::now().timestamp();
        SessionContext {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            history: VecDeque::with_capacity(self.config.history_capacity),
            entities: EntityMap::new(),
            state: ConversationState::Initial,
            current_intent: None,
            created_at: now,
            last_activity: now,
            turn_count: 0,
        }
    }

    /// Whether the session has been idle longer than the configured timeout.
    pub fn is_expired(&self, session: &SessionContext, now: i64) -> bool {
        let timeout_secs = i64::from(self.config.idle_timeout_minutes) * 60;
        now - session.last_activity > timeout_secs
    }

    /// Merge one turn's entities into the accumulated map.
    ///
    /// Last non-empty value wins per key; empty values never clear anything.
    /// Exam results merge per subject.
    pub fn merge_entities(&self, session: &mut SessionContext, incoming: &EntityMap) {
        for (kind, value) in incoming {
            if value.is_empty() {
                continue;
            }
            match (session.entities.get_mut(kind), value) {
                (Some(EntityValue::Exam(existing)), EntityValue::Exam(new)) => {
                    existing.extend(new.iter().map(|(s, c)| (*s, c.clone())));
                }
                _ => {
                    session.entities.insert(*kind, value.clone());
                }
            }
        }
    }

    /// Append a turn, evicting the oldest once the history is full.
    pub fn record_turn(&self, session: &mut SessionContext, entry: TurnEntry) {
        session.last_activity = entry.timestamp.max(session.last_activity);
        session.turn_count += 1;
        session.current_intent = Some(entry.intent);
        session.history.push_back(entry);
        while session.history.len() > self.config.history_capacity {
            session.history.pop_front();
        }
    }

    /// Whether `normalized` equals one of the last K recorded messages.
    ///
    /// Call before recording the current turn.
    pub fn is_repeating_question(&self, session: &SessionContext, normalized: &str) -> bool {
        if normalized.is_empty() {
            return false;
        }
        session
            .history
            .iter()
            .rev()
            .take(self.config.repetition_window)
            .any(|t| t.normalized_message == normalized)
    }

    /// Required entities for an intent; empty when it needs none.
    pub fn required_entities(&self, intent: Intent) -> &[EntityKind] {
        self.required.get(intent).unwrap_or(&[])
    }

    /// Required entities not yet in the session, in table order.
    pub fn missing_entities(&self, session: &SessionContext, intent: Intent) -> Vec<EntityKind> {
        self.required_entities(intent)
            .iter()
            .filter(|k| {
                session
                    .entities
                    .get(*k)
                    .map_or(true, |v| v.is_empty())
            })
            .copied()
            .collect()
    }

    pub fn has_required_entities(&self, session: &SessionContext, intent: Intent) -> bool {
        self.missing_entities(session, intent).is_empty()
    }

    /// Apply this turn's transitions and return the resulting state.
    ///
    /// Call after the turn has been recorded.
    pub fn advance_state(&self, session: &mut SessionContext, intent: Intent) -> ConversationState {
        let before = session.state;
        if session.state == ConversationState::Initial && session.turn_count > 0 {
            session.state = ConversationState::GatheringInfo;
        }

        // Intents without required entities always count as satisfied.
        let satisfied = self.has_required_entities(session, intent);
        let target = if intent == Intent::Completed || (satisfied && session.turn_count > 1) {
            Some(ConversationState::Completed)
        } else if satisfied && intent != Intent::ClarificationNeeded {
            Some(ConversationState::Processing)
        } else {
            None
        };

        if let Some(target) = target {
            if target > session.state {
                session.state = target;
            }
        }

        if session.state != before {
            debug!(
                "Session {} moved {:?} -> {:?} on {}",
                session.session_id, before, session.state, intent
            );
        }
        session.state
    }

    /// Clarification questions for the missing entities, at most `cap`.
    pub fn clarification_questions(
        &self,
        intent: Intent,
        missing: &[EntityKind],
        cap: usize,
    ) -> Vec<String> {
        missing
            .iter()
            .filter_map(|kind| self.templates.question(intent, *kind))
            .take(cap)
            .map(str::to_string)
            .collect()
    }

    /// Return the session to `initial`, dropping entities, intent and history.
    pub fn reset(&self, session: &mut SessionContext) {
        session.entities.clear();
        session.history.clear();
        session.current_intent = None;
        session.state = ConversationState::Initial;
        session.turn_count = 0;
        session.last_activity = Utc::now().timestamp();
    }
}

impl Default for ConversationManager {
    fn default() -> Self {
        Self::new(
            SessionConfig::default(),
            RequiredEntities::default(),
            ClarificationTemplates::default(),
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
