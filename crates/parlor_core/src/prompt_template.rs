//! Instruction prompt rendering
//!
//! A [`PromptTemplate`] is parsed once at startup into literal text and the
//! two slots it fills on every request. Rendering is a single pass over the
//! parsed segments, so slot markers that show up in chat text are never
//! expanded a second time.

use std::str::FromStr;

use crate::{CoreError, Result};

pub const HISTORY_SLOT: &str = "{history}";
pub const INPUT_SLOT: &str = "{input}";

/// Placeholder for the bot's name in persona text.
pub const CHAR_PLACEHOLDER: &str = "{{char}}";

/// Placeholder for the persona text in custom templates.
pub const PERSONA_PLACEHOLDER: &str = "{{persona}}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    History,
    Input,
}

/// Immutable prompt template with a history slot and an input slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// The standard instruction layout: persona, history, new line, then an
    /// open response turn for `bot_name`.
    ///
    /// `{{char}}` in the persona is replaced with `bot_name`. Persona text is
    /// taken literally, so braces in it never become slots.
    pub fn instruction(persona: &str, bot_name: &str) -> Self {
        let persona = persona.replace(CHAR_PLACEHOLDER, bot_name);
        Self {
            segments: vec![
                Segment::Literal(format!("### Instruction:\n{persona}\n")),
                Segment::History,
                Segment::Literal("\n".to_string()),
                Segment::Input,
                Segment::Literal(format!("\n### Response:\n{bot_name}:")),
            ],
        }
    }

    /// Parse a custom template containing `{history}` and `{input}` exactly once each.
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = template;
        let (mut seen_history, mut seen_input) = (false, false);

        loop {
            let next_history = rest.find(HISTORY_SLOT);
            let next_input = rest.find(INPUT_SLOT);
            let (at, slot, len) = match (next_history, next_input) {
                (Some(h), Some(i)) if h < i => (h, Segment::History, HISTORY_SLOT.len()),
                (_, Some(i)) => (i, Segment::Input, INPUT_SLOT.len()),
                (Some(h), None) => (h, Segment::History, HISTORY_SLOT.len()),
                (None, None) => break,
            };

            let seen = match slot {
                Segment::History => &mut seen_history,
                _ => &mut seen_input,
            };
            if *seen {
                return Err(CoreError::InvalidTemplate {
                    reason: format!("slot {} appears more than once", slot_name(&slot)),
                });
            }
            *seen = true;

            if at > 0 {
                segments.push(Segment::Literal(rest[..at].to_string()));
            }
            segments.push(slot);
            rest = &rest[at + len..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        for (seen, slot) in [(seen_history, HISTORY_SLOT), (seen_input, INPUT_SLOT)] {
            if !seen {
                return Err(CoreError::InvalidTemplate {
                    reason: format!("missing slot {slot}"),
                });
            }
        }

        Ok(Self { segments })
    }

    /// Fill `{{persona}}` in the literal text with `persona`.
    ///
    /// Only literals are touched, so slot markers inside the persona stay
    /// plain text.
    pub fn with_persona(mut self, persona: &str) -> Self {
        for segment in &mut self.segments {
            if let Segment::Literal(text) = segment {
                *text = text.replace(PERSONA_PLACEHOLDER, persona);
            }
        }
        self
    }

    /// Substitute `history` and `input` into the template.
    pub fn render(&self, history: &str, input: &str) -> String {
        let mut out = String::with_capacity(
            self.segments
                .iter()
                .map(|s| match s {
                    Segment::Literal(text) => text.len(),
                    _ => 0,
                })
                .sum::<usize>()
                + history.len()
                + input.len(),
        );
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::History => out.push_str(history),
                Segment::Input => out.push_str(input),
            }
        }
        out
    }
}

impl FromStr for PromptTemplate {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn slot_name(slot: &Segment) -> &'static str {
    match slot {
        Segment::History => HISTORY_SLOT,
        Segment::Input => INPUT_SLOT,
        Segment::Literal(_) => "literal",
    }
}
