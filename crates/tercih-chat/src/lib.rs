//! Turkish dialogue engine for university-admissions questions.
//!
//! Classifies each message, extracts universities, departments, score types
//! and exam results, keeps per-session context, and answers with a structured
//! envelope that also asks for whatever is still missing.

pub mod catalog;
pub mod context;
pub mod entity;
pub mod error;
pub mod follow_up;
pub mod fuzzy;
pub mod intent;
pub mod normalizer;
pub mod orchestrator;
pub mod response;
pub mod store;
pub mod types;

pub use catalog::{CatalogProvider, CatalogSnapshot, StaticCatalog};
pub use context::{ClarificationTemplates, ConversationManager, RequiredEntities};
pub use entity::{to_entity_map, EntityExtractor, EntityTables};
pub use error::ChatError;
pub use follow_up::{FollowUpHandler, FollowUpInput, FollowUpTemplate, FollowUpTemplates};
pub use fuzzy::{FuzzyMatch, FuzzyMatcher, SearchField, SimilarityMetric};
pub use intent::{IntentClassifier, IntentKeywords};
pub use normalizer::{normalize, TextNormalizer};
pub use orchestrator::{fallback_envelope, DialogueOrchestrator};
pub use response::{ResponseRenderer, TemplateRenderer};
pub use store::{InMemorySessionStore, SessionStore};
pub use types::{
    EntityMatch, FollowUp, FollowUpKind, IntentClassification, ResponseEnvelope, SessionContext,
    Span, TurnEntry,
};
