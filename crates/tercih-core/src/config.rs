use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TercihError};

/// Top-level configuration for the Tercih assistant.
///
/// Loaded from `~/.tercih/config.toml` by default. Each section configures
/// one component of the dialogue engine; every section and field is
/// optional and falls back to its default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TercihConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub dialogue: DialogueConfig,
}

impl TercihConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TercihConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TercihError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values outside the ranges the engine relies on.
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f64| -> Result<()> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(TercihError::Config(format!("{} must be within [0, 1], got {}", name, v)))
            }
        };
        unit("matcher.similarity_threshold", self.matcher.similarity_threshold)?;
        unit("extractor.language_similarity", self.extractor.language_similarity)?;
        if self.classifier.confidence_scale <= 0.0 {
            return Err(TercihError::Config(
                "classifier.confidence_scale must be positive".to_string(),
            ));
        }
        if self.session.history_capacity == 0 {
            return Err(TercihError::Config(
                "session.history_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Optional JSON catalog snapshot replacing the built-in catalogs.
    pub catalog_path: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            catalog_path: None,
        }
    }
}

/// Text normalization tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Domain words removed before matching (never from displayed text).
    pub filler_words: Vec<String>,
    /// Short form -> expansion.
    pub abbreviations: BTreeMap<String, String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let abbreviations = [
            ("bilg muh", "bilgisayar mühendisliği"),
            ("bil muh", "bilgisayar mühendisliği"),
            ("bilmuh", "bilgisayar mühendisliği"),
            ("end muh", "endüstri mühendisliği"),
            ("elk elk", "elektrik elektronik mühendisliği"),
            ("muh", "mühendisliği"),
            ("üni", "üniversitesi"),
            ("univ", "üniversitesi"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            filler_words: [
                "üniversitesi",
                "üniversite",
                "universitesi",
                "fakültesi",
                "bölümü",
                "bölüm",
                "mühendisliği",
                "programı",
            ]
            .iter()
            .map(|w| w.to_string())
            .collect(),
            abbreviations,
        }
    }
}

/// Fuzzy matcher scoring parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum score for a candidate to be returned.
    pub similarity_threshold: f64,
    pub exact_bonus: f64,
    pub alias_bonus: f64,
    pub substring_bonus: f64,
    pub token_boundary_bonus: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            exact_bonus: 0.3,
            alias_bonus: 0.2,
            substring_bonus: 0.1,
            token_boundary_bonus: 0.15,
        }
    }
}

/// Intent classifier parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum weighted evidence for a keyword intent to win.
    pub min_evidence: f64,
    /// Added to calculation intents when the message contains numbers.
    pub numeric_boost: f64,
    /// Added to inquiry intents for questions.
    pub question_boost: f64,
    /// Added to the previous turn's intent.
    pub stickiness: f64,
    /// Evidence at which confidence reaches ~63%.
    pub confidence_scale: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_evidence: 0.8,
            numeric_boost: 0.5,
            question_boost: 0.3,
            stickiness: 0.5,
            confidence_scale: 1.5,
        }
    }
}

/// Entity extractor parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Longest token window tried against the catalogs.
    pub max_span_tokens: usize,
    /// Shorter spans must match a catalog name or alias exactly.
    pub min_fuzzy_span_chars: usize,
    /// Similarity needed for a misspelled language token.
    pub language_similarity: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_span_tokens: 4,
            min_fuzzy_span_chars: 4,
            language_similarity: 0.85,
        }
    }
}

/// Session context parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Turn entries kept per session (oldest evicted first).
    pub history_capacity: usize,
    /// Previous messages compared for repetition.
    pub repetition_window: usize,
    /// Idle minutes after which the sweep removes a session.
    pub idle_timeout_minutes: u32,
    /// Clarification questions surfaced per turn.
    pub max_clarifications: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: 10,
            repetition_window: 3,
            idle_timeout_minutes: 30,
            max_clarifications: 2,
        }
    }
}

/// Per-turn dialogue limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Longer messages are truncated.
    pub max_message_chars: usize,
    /// Suggestions returned in the envelope.
    pub max_suggestions: usize,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 2000,
            max_suggestions: 3,
        }
    }
}
