//! Dialogue orchestrator: central coordinator wiring classifier, extractor,
//! context and rendering into one per-turn operation.
//!
//! `process_turn` never fails: any error inside the pipeline is logged and
//! turned into a fixed apologetic envelope.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use tercih_core::{EntityMap, Intent, TercihConfig};

use crate::catalog::{CatalogProvider, CatalogSnapshot, StaticCatalog};
use crate::context::{ClarificationTemplates, ConversationManager, RequiredEntities};
use crate::entity::{to_entity_map, EntityExtractor, EntityTables};
use crate::error::ChatError;
use crate::follow_up::{FollowUpHandler, FollowUpInput};
use crate::fuzzy::FuzzyMatcher;
use crate::intent::{IntentClassifier, IntentKeywords};
use crate::normalizer::{normalize, TextNormalizer};
use crate::response::{ResponseRenderer, TemplateRenderer};
use crate::store::{InMemorySessionStore, SessionStore};
use crate::types::{
    EntityMatch, IntentClassification, ResponseEnvelope, SessionContext, TurnEntry,
};

const ANONYMOUS_USER: &str = "anonymous";

/// Envelope returned when a turn fails internally.
pub fn fallback_envelope() -> ResponseEnvelope {
    ResponseEnvelope {
        intent: Intent::Error,
        entities: EntityMap::new(),
        confidence: 0.0,
        message: "Üzgünüm, isteğinizi işlerken bir sorun oluştu. Lütfen biraz sonra tekrar deneyin."
            .to_string(),
        suggestions: generic_suggestions(),
        clarification_needed: None,
        follow_up_questions: None,
    }
}

fn generic_suggestions() -> Vec<String> {
    vec![
        "Sorunuzu tekrar yazmayı deneyin".to_string(),
        "Bir üniversite ya da bölüm adı belirtin".to_string(),
        "Örnek: \"ODTÜ bilgisayar mühendisliği taban puanı\"".to_string(),
    ]
}

fn check_length(text: &str, max_chars: usize) -> Result<&str, ChatError> {
    let len = text.chars().count();
    if len > max_chars {
        return Err(ChatError::InvalidInput(format!(
            "message has {} chars, limit is {}",
            len, max_chars
        )));
    }
    Ok(text)
}

/// Central dialogue coordinator.
pub struct DialogueOrchestrator {
    config: TercihConfig,
    classifier: IntentClassifier,
    extractor: EntityExtractor,
    context: ConversationManager,
    follow_ups: FollowUpHandler,
    catalog: Arc<dyn CatalogProvider>,
    store: Arc<dyn SessionStore>,
    renderer: Arc<dyn ResponseRenderer>,
}

impl DialogueOrchestrator {
    /// Create an orchestrator with the built-in tables and the given collaborators.
    pub fn new(
        config: TercihConfig,
        catalog: Arc<dyn CatalogProvider>,
        store: Arc<dyn SessionStore>,
        renderer: Arc<dyn ResponseRenderer>,
    ) -> Self {
        let normalizer = TextNormalizer::new(&config.normalizer);
        let matcher = FuzzyMatcher::new(config.matcher.clone(), normalizer);
        let extractor =
            EntityExtractor::new(config.extractor.clone(), matcher, EntityTables::default());
        let classifier =
            IntentClassifier::new(config.classifier.clone(), IntentKeywords::default());
        let context = ConversationManager::new(
            config.session.clone(),
            RequiredEntities::default(),
            ClarificationTemplates::default(),
        );

        Self {
            config,
            classifier,
            extractor,
            context,
            follow_ups: FollowUpHandler::default(),
            catalog,
            store,
            renderer,
        }
    }

    /// Built-in catalog, in-memory sessions and template rendering.
    pub fn with_defaults(config: TercihConfig) -> Self {
        Self::new(
            config,
            Arc::new(StaticCatalog::default()),
            Arc::new(InMemorySessionStore::new()),
            Arc::new(TemplateRenderer::new()),
        )
    }

    /// Process one user message. Never fails.
    pub fn process_turn(&self, session_id: &str, user_id: &str, text: &str) -> ResponseEnvelope {
        match self.try_process_turn(session_id, user_id, text) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!("Turn failed for session {:?}: {}", session_id, e);
                fallback_envelope()
            }
        }
    }

    /// Process one user message, surfacing internal errors.
    pub fn try_process_turn(
        &self,
        session_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<ResponseEnvelope, ChatError> {
        let session_id = match session_id.trim() {
            "" => {
                let id = format!("anon-{}", Uuid::new_v4());
                warn!("Turn without a session id; using {}", id);
                id
            }
            id => id.to_string(),
        };
        let user_id = match user_id.trim() {
            "" => ANONYMOUS_USER.to_string(),
            id => id.to_string(),
        };

        let max_chars = self.config.dialogue.max_message_chars;
        let text: String = match check_length(text, max_chars) {
            Ok(text) => text.to_string(),
            Err(e) => {
                warn!("Session {}: {}; truncating", session_id, e);
                text.chars().take(max_chars).collect()
            }
        };

        let normalized = normalize(&text);
        if normalized.is_empty() {
            return self.empty_message_envelope(&session_id);
        }

        let catalog = self.catalog.snapshot()?;
        let mut envelope = None;
        self.store.update_or_create(
            &session_id,
            &|| self.context.create_session(&session_id, &user_id),
            &mut |session| {
                // Commit only a fully rendered turn.
                let mut draft = session.clone();
                envelope = Some(self.run_turn(&mut draft, &text, &normalized, &catalog)?);
                *session = draft;
                Ok(())
            },
        )?;
        envelope.ok_or_else(|| ChatError::Internal("turn produced no response".to_string()))
    }

    /// Everything that happens under the session lock.
    fn run_turn(
        &self,
        session: &mut SessionContext,
        text: &str,
        normalized: &str,
        catalog: &CatalogSnapshot,
    ) -> Result<ResponseEnvelope, ChatError> {
        let previous = session.previous_intent();
        let is_repeating = self.context.is_repeating_question(session, normalized);

        let mut classification = self.classifier.classify(text, previous);
        let mut matches = self
            .extractor
            .extract_for_intent(text, classification.intent, catalog);

        // A bare answer to an open question continues the previous intent.
        if let Some((continued, continued_matches)) =
            self.continuation(session, &classification, text, catalog)
        {
            classification = continued;
            matches = continued_matches;
        }
        let intent = classification.intent;

        let turn_entities = to_entity_map(&matches);
        self.context.merge_entities(session, &turn_entities);
        self.context.record_turn(
            session,
            TurnEntry {
                timestamp: Utc::now().timestamp(),
                intent,
                entities: turn_entities,
                message: text.to_string(),
                normalized_message: normalized.to_string(),
                bot_response: None,
            },
        );
        let state = self.context.advance_state(session, intent);

        let missing = self.context.missing_entities(session, intent);
        let clarifications = self.context.clarification_questions(
            intent,
            &missing,
            self.config.session.max_clarifications,
        );
        let follow_ups = self.follow_ups.generate(&FollowUpInput {
            intent,
            entities: &session.entities,
            missing: &missing,
            clarifications: &clarifications,
            normalized_message: normalized,
            is_repeating,
        });

        let mut message = self.renderer.render(intent, &session.entities)?;
        if is_repeating {
            message = format!("Bu soruyu az önce de sordunuz. {}", message);
        }
        if let Some(last) = session.history.back_mut() {
            last.bot_response = Some(message.clone());
        }

        debug!(
            "Session {} turn {}: {} ({:.2}), state {:?}, missing {:?}",
            session.session_id,
            session.turn_count,
            intent,
            classification.confidence,
            state,
            missing
        );

        Ok(ResponseEnvelope {
            intent,
            entities: session.entities.clone(),
            confidence: classification.confidence,
            message,
            suggestions: follow_ups
                .into_iter()
                .take(self.config.dialogue.max_suggestions)
                .map(|f| f.text)
                .collect(),
            clarification_needed: Some(
                intent == Intent::ClarificationNeeded || !missing.is_empty(),
            ),
            follow_up_questions: (!clarifications.is_empty()).then_some(clarifications),
        })
    }

    /// When classification fell back but the message supplies an entity the
    /// previous slot-filling intent is still missing, keep that intent.
    fn continuation(
        &self,
        session: &SessionContext,
        classification: &IntentClassification,
        text: &str,
        catalog: &CatalogSnapshot,
    ) -> Option<(IntentClassification, Vec<EntityMatch>)> {
        if !classification.intent.is_fallback() {
            return None;
        }
        let previous = session
            .previous_intent()
            .filter(|p| self.context.required().is_slot_filling(*p))?;
        let missing = self.context.missing_entities(session, previous);
        let matches = self.extractor.extract_for_intent(text, previous, catalog);
        if !matches.iter().any(|m| missing.contains(&m.kind)) {
            return None;
        }

        debug!(
            "Session {}: continuing {} instead of {}",
            session.session_id, previous, classification.intent
        );
        let score = classification.score.max(self.config.classifier.min_evidence);
        Some((
            IntentClassification {
                intent: previous,
                confidence: self.classifier.confidence(score),
                evidence: Vec::new(),
                score,
            },
            matches,
        ))
    }

    fn empty_message_envelope(&self, session_id: &str) -> Result<ResponseEnvelope, ChatError> {
        let entities = self
            .store
            .get(session_id)?
            .map(|s| s.entities)
            .unwrap_or_default();
        Ok(ResponseEnvelope {
            intent: Intent::General,
            entities,
            confidence: 0.0,
            message: "Mesajınız boş görünüyor. Size nasıl yardımcı olabilirim?".to_string(),
            suggestions: generic_suggestions()
                .into_iter()
                .take(self.config.dialogue.max_suggestions)
                .collect(),
            clarification_needed: Some(true),
            follow_up_questions: None,
        })
    }

    // -- Session administration --

    /// Similarity of two names in `[0, 1]`, as used for catalog matching.
    pub fn similarity_score(&self, a: &str, b: &str) -> f64 {
        self.extractor.matcher().similarity_score(a, b)
    }

    /// Copy of a session's context.
    pub fn session(&self, session_id: &str) -> Result<Option<SessionContext>, ChatError> {
        self.store.get(session_id)
    }

    /// Recorded turns of a session, oldest first.
    pub fn history(&self, session_id: &str) -> Result<Vec<TurnEntry>, ChatError> {
        self.store
            .get(session_id)?
            .map(|s| s.history.into_iter().collect())
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))
    }

    /// Remove a session; returns whether it existed.
    pub fn clear_session(&self, session_id: &str) -> Result<bool, ChatError> {
        self.store.clear(session_id)
    }

    /// Return a session to its initial state; a missing session is a no-op.
    pub fn reset_session(&self, session_id: &str) -> Result<bool, ChatError> {
        self.store.modify_existing(session_id, &mut |session| {
            self.context.reset(session);
            Ok(())
        })
    }

    /// Remove sessions idle past the configured timeout.
    pub fn sweep_expired(&self) -> Result<usize, ChatError> {
        self.sweep_expired_at(Utc::now().timestamp())
    }

    /// Sweep as if the current time were `now` (epoch seconds).
    pub fn sweep_expired_at(&self, now: i64) -> Result<usize, ChatError> {
        let idle_secs = i64::from(self.config.session.idle_timeout_minutes) * 60;
        self.store.sweep_expired(idle_secs, now)
    }

    pub fn session_count(&self) -> Result<usize, ChatError> {
        self.store.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
