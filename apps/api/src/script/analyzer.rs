//! Script analyzer: one LLM call per request, no retries, no state.
//!
//! Failures are returned to the caller as `AnalysisError`; a reply that is not
//! valid breakdown JSON keeps the raw text so the client can show it for debugging.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::prompts::{fill, json_only_system};
use crate::llm_client::{strip_json_fences, LlmBackend};
use crate::script::prompts::{SCRIPT_ANALYSIS_PROMPT, SCRIPT_ANALYSIS_SYSTEM};

/// Upper bound on accepted script size, in bytes.
pub const MAX_SCRIPT_BYTES: usize = 400_000;

/// Genres the budget model was trained on.
pub const GENRES: &[&str] = &[
    "Action",
    "Comedy",
    "Drama",
    "Horror",
    "Sci-Fi",
    "Thriller",
    "Romance",
    "Adventure",
    "Musical",
    "Indie",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterBreakdown {
    pub name: String,
    #[serde(alias = "dialogue_line_count")]
    pub dialogue_lines: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationBreakdown {
    pub name: String,
    #[serde(alias = "scene_count")]
    pub scenes: u32,
}

/// Structured breakdown of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logline: Option<String>,
    #[serde(default)]
    pub characters: Vec<CharacterBreakdown>,
    #[serde(default)]
    pub locations: Vec<LocationBreakdown>,
    #[serde(default)]
    pub props: Vec<String>,
    pub estimated_scenes: u32,
}

impl ScriptAnalysis {
    pub fn total_dialogue_lines(&self) -> u32 {
        self.characters.iter().map(|c| c.dialogue_lines).sum()
    }

    /// Maps the genre onto the canonical spelling in `GENRES`, dropping anything
    /// the budget model does not know. Blank loglines are dropped too.
    pub fn normalize(mut self) -> Self {
        self.genre = self.genre.as_deref().and_then(canonical_genre).map(String::from);
        self.logline = self
            .logline
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        self.props.retain(|p| !p.trim().is_empty());
        self
    }
}

/// Case- and punctuation-insensitive lookup: "sci fi", "SCI-FI" and "scifi" all
/// resolve to "Sci-Fi".
pub fn canonical_genre(raw: &str) -> Option<&'static str> {
    let key = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect()
    };
    let wanted = key(raw);
    GENRES.iter().copied().find(|g| key(g) == wanted)
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid or insufficient script text provided.")]
    EmptyScript,

    #[error("Script is too long to analyze ({0} bytes).")]
    TooLong(usize),

    #[error("An unexpected error occurred during the AI API call: {0}")]
    Service(String),

    #[error("The AI request was blocked by the content filter.")]
    Blocked { reason: String },

    #[error("Failed to parse the analysis from the AI response. The AI did not return valid JSON.")]
    Malformed { detail: String, raw_response: String },
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::EmptyScript | AnalysisError::TooLong(_) => {
                AppError::Validation(err.to_string())
            }
            AnalysisError::Service(_) => AppError::llm(err.to_string()),
            AnalysisError::Blocked { ref reason } => {
                AppError::llm(format!("{err} Reason: {reason}"))
            }
            AnalysisError::Malformed {
                ref raw_response, ..
            } => AppError::Llm {
                message: err.to_string(),
                raw_response: Some(raw_response.clone()),
            },
        }
    }
}

/// Rejects scripts that must never reach the LLM.
pub fn validate_script(script: &str) -> Result<(), AnalysisError> {
    if script.trim().is_empty() {
        return Err(AnalysisError::EmptyScript);
    }
    if script.len() > MAX_SCRIPT_BYTES {
        return Err(AnalysisError::TooLong(script.len()));
    }
    Ok(())
}

/// Runs the script breakdown through the LLM.
pub async fn analyze_script(
    script: &str,
    llm: &dyn LlmBackend,
) -> Result<ScriptAnalysis, AnalysisError> {
    validate_script(script)?;

    let genres = GENRES.join(", ");
    let prompt = fill(
        SCRIPT_ANALYSIS_PROMPT,
        &[("genres", &genres), ("script", script)],
    );

    let response = llm
        .call(&prompt, &json_only_system(SCRIPT_ANALYSIS_SYSTEM))
        .await
        .map_err(|e| AnalysisError::Service(e.to_string()))?;

    if response.is_refusal() {
        return Err(AnalysisError::Blocked {
            reason: response
                .stop_reason
                .clone()
                .unwrap_or_else(|| "refusal".to_string()),
        });
    }

    let cleaned = strip_json_fences(response.text().unwrap_or_default());

    let analysis = serde_json::from_str::<ScriptAnalysis>(cleaned).map_err(|e| {
        warn!("Script analysis reply was not valid JSON ({e}): {cleaned}");
        AnalysisError::Malformed {
            detail: e.to_string(),
            raw_response: cleaned.to_string(),
        }
    })?;

    let analysis = analysis.normalize();
    info!(
        "Script analyzed: {} characters, {} locations, {} props, {} scenes",
        analysis.characters.len(),
        analysis.locations.len(),
        analysis.props.len(),
        analysis.estimated_scenes
    );

    Ok(analysis)
}
