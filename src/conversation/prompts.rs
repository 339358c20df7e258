//! Prompt builders for each turn kind of the conversation protocol.
//!
//! Every prompt embeds only the text of the turn it responds to; earlier
//! turns are not replayed.

use std::fmt;
use std::str::FromStr;

use crate::personas::Persona;

/// Language the generated turns are written in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputLanguage {
    #[default]
    Korean,
    English,
    /// Any other language, named as the model should read it.
    Other(String),
}

impl OutputLanguage {
    /// Language name as written in prompts.
    pub fn name(&self) -> &str {
        match self {
            Self::Korean => "Korean",
            Self::English => "English",
            Self::Other(name) => name,
        }
    }

    /// Directive for the opening user turn.
    fn opening_directive(&self) -> String {
        format!("{} (Natural tone)", self.name())
    }
}

impl fmt::Display for OutputLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "" => Err("language must not be empty".to_string()),
            "korean" | "ko" => Ok(Self::Korean),
            "english" | "en" => Ok(Self::English),
            _ => Ok(Self::Other(trimmed.to_string())),
        }
    }
}

/// Opening user turn: the user explains why they are stuck on the goal.
pub fn opening_prompt(user: &Persona, goal: &str, language: &OutputLanguage) -> String {
    format!(
        "Role: You are a {kind} persona ({traits}).\n\
         Goal: {goal}.\n\
         Context: You are struggling with your goal today.\n\
         Task: Write a short message (1-2 sentences) to your coach complaining or explaining why you're stuck.\n\
         Language: {language}.",
        kind = user.kind,
        traits = user.traits,
        goal = goal,
        language = language.opening_directive(),
    )
}

/// Coach turn replying to the previous user message.
pub fn coach_prompt(
    coach: &Persona,
    user: &Persona,
    previous: &str,
    language: &OutputLanguage,
) -> String {
    format!(
        "Role: You are a {kind} persona ({traits}).\n\
         User Input: \"{previous}\"\n\
         User Persona: {user_kind}.\n\
         Task: Reply to the user. Maintain your persona's tone strictly. Keep it under 200 characters.\n\
         Language: {language}.",
        kind = coach.kind,
        traits = coach.traits,
        previous = previous,
        user_kind = user.kind,
        language = language,
    )
}

/// User turn reacting to the coach's message according to personality.
pub fn reaction_prompt(user: &Persona, coach_message: &str, language: &OutputLanguage) -> String {
    format!(
        "Role: You are a {kind} persona.\n\
         Coach Input: \"{coach_message}\"\n\
         Task: Respond to the coach. React according to your personality \
         (e.g. if INTJ and coach is too emotional, be annoyed. If ENFP and coach is strict, be rebellious or discouraged).\n\
         Language: {language}.",
        kind = user.kind,
        coach_message = coach_message,
        language = language,
    )
}
