// LLM prompt templates for script breakdown.

/// Role for script analysis; sent through `json_only_system`.
pub const SCRIPT_ANALYSIS_SYSTEM: &str = "\
You are a professional script breakdown assistant for film production. \
You read screenplays and extract the production elements a line producer needs.";

/// Script analysis prompt. Replace `{genres}` and `{script}` before sending.
pub const SCRIPT_ANALYSIS_PROMPT: &str = r#"Analyze the following script text and return a JSON object with this EXACT structure:
{
  "genre": "FILM_GENRE",
  "logline": "One sentence summary of the story",
  "characters": [{"name": "CHARACTER_NAME", "dialogue_lines": 0}],
  "locations": [{"name": "LOCATION_NAME", "scenes": 0}],
  "props": ["PROP_NAME_1", "PROP_NAME_2"],
  "estimated_scenes": 0
}

Rules:
- "genre" must be exactly one of: {genres}.
- A character's "dialogue_lines" counts the dialogue blocks spoken by that character.
- A location's "scenes" counts the scene headings (INT./EXT.) set in that location.
  Use the bare location name without INT./EXT. and without the time of day.
- "estimated_scenes" is the total number of scenes in the text.
- "props" lists physical objects the scenes require, each named once.
- Character and location names are written in UPPER CASE as they appear in the script.

SCRIPT:
{script}"#;
