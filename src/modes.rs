use std::fmt;

/// Explanation personality. The set of accepted external strings is the
/// four canonical names plus the `senior` alias for [`Mode::Review`];
/// anything else is rejected at the boundary rather than defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Friend,
    Professor,
    Babysitter,
    Review,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Friend, Mode::Professor, Mode::Babysitter, Mode::Review];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "friend" => Some(Mode::Friend),
            "professor" => Some(Mode::Professor),
            "babysitter" => Some(Mode::Babysitter),
            "review" | "senior" => Some(Mode::Review),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Friend => "friend",
            Mode::Professor => "professor",
            Mode::Babysitter => "babysitter",
            Mode::Review => "review",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Mode::Friend => "Casual, friendly explanations",
            Mode::Professor => "Academic, detailed explanations",
            Mode::Babysitter => "Beginner-friendly, simple explanations",
            Mode::Review => "Critical, blunt feedback",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            Mode::Friend => {
                "You are a supportive peer. Give a concise, positive explanation in 5-8 bullet \
                 points. Focus on what the code does and how, avoid heavy theory, end with one \
                 practical tip."
            }
            Mode::Professor => {
                "You are a CS professor. Provide a structured explanation with sections: Purpose, \
                 Flow, Key Concepts, Complexity, Edge Cases. Be precise and technical; keep each \
                 section brief (2-3 lines)."
            }
            Mode::Babysitter => {
                "You teach a beginner. Explain step-by-step using very simple words and tiny \
                 examples. Avoid jargon; define any necessary term in one short line."
            }
            Mode::Review => {
                "You are a strict code reviewer. Output ONLY critical feedback and actionable \
                 improvements. No restating the code. Sections: Issues, Risks, Refactor \
                 Suggestions. Be direct and terse."
            }
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compose the generation prompt for a mode. Pure: identical inputs always
/// produce identical prompts. Unknown modes cannot reach this point because
/// `Mode` is already parsed.
pub fn build_prompt(code: &str, mode: Mode) -> String {
    format!(
        "{instruction}\n\n\
         Please explain the following code:\n\n\
         ```\n{code}\n```\n\n\
         Provide a clear explanation following the personality and style described above.\n\
         Focus on what the code does, how it works, and any important concepts or patterns used.",
        instruction = mode.instruction(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn senior_is_an_alias_for_review() {
        assert_eq!(Mode::parse("senior"), Some(Mode::Review));
        assert_eq!(Mode::parse("review"), Some(Mode::Review));
    }

    #[test]
    fn parsing_is_case_insensitive_and_trims() {
        assert_eq!(Mode::parse(" Friend "), Some(Mode::Friend));
        assert_eq!(Mode::parse("PROFESSOR"), Some(Mode::Professor));
    }

    #[test]
    fn unknown_modes_are_rejected() {
        assert_eq!(Mode::parse("pirate"), None);
        assert_eq!(Mode::parse(""), None);
    }

    #[test]
    fn alias_routes_to_the_same_prompt_template() {
        let code = "print('hi')";
        let senior = build_prompt(code, Mode::parse("senior").unwrap());
        let review = build_prompt(code, Mode::parse("review").unwrap());
        assert_eq!(senior, review);
    }

    #[test]
    fn prompt_is_deterministic_and_embeds_the_code() {
        let code = "def f():\n    return 1";
        let first = build_prompt(code, Mode::Professor);
        let second = build_prompt(code, Mode::Professor);
        assert_eq!(first, second);
        assert!(first.contains(code));
        assert!(first.starts_with("You are a CS professor."));
    }
}
