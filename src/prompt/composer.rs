//! Loads per-phase prompt directories, substitutes `{var}` placeholders,
//! and resolves `{{> partial.md}}` transclusion.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::llm::message::{ChatMessage, Role};

use super::templates::{
    PHASE0_5_INSTRUCTIONS, PHASE0_5_SYSTEM, PHASE0_INSTRUCTIONS, PHASE0_SYSTEM,
    PHASE1_5_INSTRUCTIONS, PHASE1_5_SYSTEM, PHASE1_INSTRUCTIONS, PHASE1_SYSTEM,
    PHASE2_INSTRUCTIONS, PHASE2_SYSTEM, PHASE3_INSTRUCTIONS, PHASE3_SYSTEM,
    PHASE4_INSTRUCTIONS, PHASE4_SYSTEM, RETRIEVAL_INSTRUCTIONS_PARTIAL,
};

/// Filename for a phase's system prompt.
const SYSTEM_FILENAME: &str = "system.md";
/// Filename for a phase's instructions template.
const INSTRUCTIONS_FILENAME: &str = "instructions.md";
/// Filename for a phase's optional JSON output schema.
const OUTPUT_SCHEMA_FILENAME: &str = "output_schema.json";

/// Maximum transclusion recursion depth, guarding against partial cycles.
const MAX_PARTIAL_DEPTH: u8 = 8;

/// The loaded (or defaulted) prompt material for one phase.
#[derive(Debug, Clone)]
pub struct PhasePrompt {
    /// The phase's system prompt, after partial resolution.
    pub system: String,
    /// The phase's instructions template, after partial resolution (but
    /// before `{var}` substitution).
    pub instructions: String,
    /// The phase's optional JSON output schema, attached to the user
    /// message when present.
    pub output_schema: Option<serde_json::Value>,
}

/// Loads and composes prompts from a directory-per-phase layout.
pub struct PromptComposer {
    prompts_dir: PathBuf,
}

impl PromptComposer {
    /// Creates a composer rooted at `prompts_dir`.
    #[must_use]
    pub fn new(prompts_dir: PathBuf) -> Self {
        Self { prompts_dir }
    }

    /// Loads the prompt material for `phase_key`, falling back to the
    /// compiled-in default for any file that does not exist on disk.
    #[must_use]
    pub fn load_phase(&self, phase_key: &str) -> PhasePrompt {
        let dir = self.prompts_dir.join(phase_key);
        let (default_system, default_instructions) = defaults_for(phase_key);

        let system = read_or_default(&dir.join(SYSTEM_FILENAME), default_system);
        let instructions = read_or_default(&dir.join(INSTRUCTIONS_FILENAME), default_instructions);
        let output_schema = std::fs::read_to_string(dir.join(OUTPUT_SCHEMA_FILENAME))
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok());

        let system = resolve_partials(&system, &dir, 0);
        let instructions = resolve_partials(&instructions, &dir, 0);

        PhasePrompt {
            system,
            instructions,
            output_schema,
        }
    }

    /// Composes the final `[system, user]` message pair for `phase_key`,
    /// substituting `{var}` placeholders from `vars` into both the
    /// system prompt and the instructions template.
    #[must_use]
    pub fn compose(&self, phase_key: &str, vars: &HashMap<&str, &str>) -> Vec<ChatMessage> {
        let phase = self.load_phase(phase_key);
        let system = substitute_vars(&phase.system, vars);
        let mut user = substitute_vars(&phase.instructions, vars);

        if let Some(schema) = &phase.output_schema {
            user.push_str("\n\n## Output Schema\n\n");
            user.push_str(&serde_json::to_string_pretty(schema).unwrap_or_default());
        }

        vec![
            ChatMessage {
                role: Role::System,
                content: system,
                tool_calls: Vec::new(),
                tool_call_id: None,
            },
            ChatMessage {
                role: Role::User,
                content: user,
                tool_calls: Vec::new(),
                tool_call_id: None,
            },
        ]
    }

    /// Writes the compiled-in default templates to `<prompts_dir>/<phase_key>/`
    /// for every known phase. Existing files are not overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for phase_key in [
            "phase0",
            "phase0_5",
            "phase1",
            "phase1_5",
            "phase2",
            "phase3",
            "phase4",
        ] {
            let dir = self.prompts_dir.join(phase_key);
            std::fs::create_dir_all(&dir)?;
            let (system, instructions) = defaults_for(phase_key);
            for (filename, content) in [
                (SYSTEM_FILENAME, system),
                (INSTRUCTIONS_FILENAME, instructions),
            ] {
                let path = dir.join(filename);
                if !path.exists() {
                    std::fs::write(&path, content)?;
                    written.push(path);
                }
            }
        }

        let partials_dir = self.prompts_dir.join("partials");
        std::fs::create_dir_all(&partials_dir)?;
        let partial_path = partials_dir.join("retrieval_instructions.md");
        if !partial_path.exists() {
            std::fs::write(&partial_path, RETRIEVAL_INSTRUCTIONS_PARTIAL)?;
            written.push(partial_path);
        }

        Ok(written)
    }
}

fn defaults_for(phase_key: &str) -> (&'static str, &'static str) {
    match phase_key {
        "phase0" => (PHASE0_SYSTEM, PHASE0_INSTRUCTIONS),
        "phase0_5" => (PHASE0_5_SYSTEM, PHASE0_5_INSTRUCTIONS),
        "phase1" => (PHASE1_SYSTEM, PHASE1_INSTRUCTIONS),
        "phase1_5" => (PHASE1_5_SYSTEM, PHASE1_5_INSTRUCTIONS),
        "phase2" => (PHASE2_SYSTEM, PHASE2_INSTRUCTIONS),
        "phase3" => (PHASE3_SYSTEM, PHASE3_INSTRUCTIONS),
        "phase4" => (PHASE4_SYSTEM, PHASE4_INSTRUCTIONS),
        _ => ("", ""),
    }
}

fn read_or_default(path: &Path, default: &'static str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|_| default.to_string())
}

/// Replaces every `{{> name.md}}` transclusion directive with the
/// contents of `<phase_dir>/../partials/name.md` (falling back to the
/// compiled-in retrieval-instructions partial, the only partial this
/// crate ships by default), recursively up to [`MAX_PARTIAL_DEPTH`].
fn resolve_partials(template: &str, phase_dir: &Path, depth: u8) -> String {
    if depth >= MAX_PARTIAL_DEPTH {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{>") {
        out.push_str(&rest[..start]);
        let Some(end) = rest[start..].find("}}") else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let directive = rest[start + 3..start + end].trim();
        let partial_dir = phase_dir
            .parent()
            .map_or_else(|| PathBuf::from("partials"), |p| p.join("partials"));
        let partial_path = partial_dir.join(directive);
        let content = std::fs::read_to_string(&partial_path).unwrap_or_else(|_| {
            if directive == "retrieval_instructions.md" {
                RETRIEVAL_INSTRUCTIONS_PARTIAL.to_string()
            } else {
                String::new()
            }
        });
        out.push_str(&resolve_partials(&content, phase_dir, depth + 1));
        rest = &rest[start + end + 2..];
    }
    out.push_str(rest);
    out
}

/// Replaces every `{var}` occurrence with its value from `vars`.
/// Unmatched placeholders are left verbatim.
fn substitute_vars(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let key = &rest[start + 1..start + end];
        if let Some(value) = vars.get(key) {
            out.push_str(value);
        } else {
            out.push_str(&rest[start..=start + end]);
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_vars_replaces_known_keys() {
        let mut vars = HashMap::new();
        vars.insert("name", "world");
        let out = substitute_vars("hello {name}!", &vars);
        assert_eq!(out, "hello world!");
    }

    #[test]
    fn test_substitute_vars_leaves_unknown_placeholders() {
        let vars = HashMap::new();
        let out = substitute_vars("hello {name}!", &vars);
        assert_eq!(out, "hello {name}!");
    }

    #[test]
    fn test_load_phase_falls_back_to_defaults_when_dir_missing() {
        let composer = PromptComposer::new(PathBuf::from("/nonexistent/prompts/dir"));
        let phase = composer.load_phase("phase1");
        assert_eq!(phase.system, PHASE1_SYSTEM);
        assert!(phase.output_schema.is_none());
    }

    #[test]
    fn test_load_phase_prefers_file_on_disk() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let phase_dir = dir.path().join("phase1");
        std::fs::create_dir_all(&phase_dir).unwrap_or_else(|_| unreachable!());
        std::fs::write(phase_dir.join("system.md"), "custom system prompt")
            .unwrap_or_else(|_| unreachable!());

        let composer = PromptComposer::new(dir.path().to_path_buf());
        let phase = composer.load_phase("phase1");
        assert_eq!(phase.system, "custom system prompt");
    }

    #[test]
    fn test_resolve_partials_transcludes_retrieval_instructions() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let phase_dir = dir.path().join("phase3");
        std::fs::create_dir_all(&phase_dir).unwrap_or_else(|_| unreachable!());

        let composer = PromptComposer::new(dir.path().to_path_buf());
        let phase = composer.load_phase("phase3");
        assert!(phase.instructions.contains("retrieval rounds"));
        assert!(!phase.instructions.contains("{{>"));
    }

    #[test]
    fn test_write_defaults_creates_all_phase_dirs() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let composer = PromptComposer::new(dir.path().to_path_buf());
        composer.write_defaults().unwrap_or_else(|_| unreachable!());
        for phase_key in ["phase0", "phase1", "phase2", "phase3", "phase4"] {
            assert!(dir.path().join(phase_key).join("system.md").exists());
        }
        assert!(dir
            .path()
            .join("partials")
            .join("retrieval_instructions.md")
            .exists());
    }

    #[test]
    fn test_compose_produces_system_then_user_message() {
        let composer = PromptComposer::new(PathBuf::from("/nonexistent"));
        let mut vars = HashMap::new();
        vars.insert("goal", "investigate pricing");
        let messages = composer.compose("phase2", &vars);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert!(messages[1].content.contains("investigate pricing"));
    }
}
