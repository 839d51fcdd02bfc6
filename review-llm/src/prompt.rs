//! Prompt composition: personality and mode blocks are pure-data strings,
//! joined by plain concatenation with explicit separators. Isolates "what
//! to ask" from "how to call" (§9).

const BASE_INSTRUCTIONS: &str = "You are an automated code reviewer. Inspect the diff below and \
respond with a single JSON object of the shape {\"issues\": [...], \"summary\": string, \"score\": number}. \
Each issue has: type, severity, message, suggestion, line, end_line, column, rule_id, suggested_fix, root_cause. \
Do not include any text outside the JSON object.";

const SECTION_SEPARATOR: &str = "\n\n---\n\n";
const DIFF_MARKER: &str = "=== FILE DIFF ===";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Personality {
    Balanced,
    Mentoring,
    Strict,
    Friendly,
    SecurityParanoid,
}

impl Personality {
    pub fn block(&self) -> &'static str {
        match self {
            Self::Balanced => "Tone: balanced and even-handed; call out both strengths and weaknesses.",
            Self::Mentoring => "Tone: mentoring; explain the reasoning behind each finding as if teaching.",
            Self::Strict => "Tone: strict; hold the code to a high bar, flag anything borderline.",
            Self::Friendly => "Tone: friendly and encouraging; soften criticism without hiding it.",
            Self::SecurityParanoid => {
                "Tone: security-paranoid; assume hostile input everywhere and flag anything unproven safe."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Security,
    Performance,
    Clean,
    Docs,
    Tests,
}

impl Mode {
    pub fn block(&self) -> &'static str {
        match self {
            Self::Security => "Focus: security — injection, auth, secrets, unsafe deserialization.",
            Self::Performance => "Focus: performance — needless allocation, N+1 patterns, blocking calls on hot paths.",
            Self::Clean => "Focus: clean code — naming, duplication, dead code, structure.",
            Self::Docs => "Focus: documentation — missing or stale comments and doc-comments on public APIs.",
            Self::Tests => "Focus: tests — missing coverage for new branches and edge cases.",
        }
    }
}

/// Assembles the full prompt: base instructions, personality, every active
/// mode, optional extra context, then the diff under a fixed marker.
pub fn build_prompt(
    personality: Personality,
    modes: &[Mode],
    extra_context: Option<&str>,
    diff_text: &str,
) -> String {
    let mut sections = vec![BASE_INSTRUCTIONS.to_string(), personality.block().to_string()];
    for mode in modes {
        sections.push(mode.block().to_string());
    }
    if let Some(context) = extra_context {
        sections.push(context.to_string());
    }
    sections.push(format!("{DIFF_MARKER}\n{diff_text}"));
    sections.join(SECTION_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_every_active_mode_block() {
        let prompt = build_prompt(Personality::Strict, &[Mode::Security, Mode::Tests], None, "diff");
        assert!(prompt.contains(Mode::Security.block()));
        assert!(prompt.contains(Mode::Tests.block()));
        assert!(!prompt.contains(Mode::Docs.block()));
    }

    #[test]
    fn diff_is_appended_under_fixed_marker() {
        let prompt = build_prompt(Personality::Balanced, &[], None, "my diff content");
        let marker_pos = prompt.find(DIFF_MARKER).expect("marker present");
        assert!(prompt[marker_pos..].contains("my diff content"));
    }
}
