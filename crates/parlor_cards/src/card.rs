//! Character card formats
//!
//! Cards exported by chat-persona frontends embed a JSON object whose field
//! names differ from the canonical layout used here. Both the flat V1 layout
//! and the V2 layout (`{"spec": "chara_card_v2", "data": {...}}`) are read.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CardError, CardResult};

/// Name substituted for `{{user}}` in example dialogue.
pub const USER_PLACEHOLDER_NAME: &str = "User";

/// Canonical character description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterCard {
    pub char_name: String,
    pub char_persona: String,
    pub char_greeting: String,
    pub example_dialogue: String,
    pub world_scenario: String,
}

/// Card as embedded by the exporting frontend
#[derive(Debug, Clone, Deserialize)]
pub struct TavernCard {
    pub name: String,
    pub description: String,
    pub first_mes: String,
    pub mes_example: String,
    pub scenario: String,
}

impl TavernCard {
    /// Parse embedded card JSON, unwrapping the V2 envelope if present.
    pub fn from_json(bytes: &[u8]) -> CardResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        let data = match value {
            Value::Object(mut root) if root.get("spec").and_then(Value::as_str).is_some() => {
                root.remove("data").unwrap_or(Value::Object(root))
            }
            other => other,
        };
        Ok(serde_json::from_value(data)?)
    }
}

impl From<TavernCard> for CharacterCard {
    fn from(card: TavernCard) -> Self {
        let example_dialogue = card
            .mes_example
            .replace("{{user}}", USER_PLACEHOLDER_NAME)
            .replace("{{char}}", &card.name);
        Self {
            char_name: card.name,
            char_persona: card.description,
            char_greeting: card.first_mes,
            example_dialogue,
            world_scenario: card.scenario,
        }
    }
}

impl CharacterCard {
    /// Read a canonical card from a JSON file.
    pub fn load(path: &Path) -> CardResult<Self> {
        let content = std::fs::read(path).map_err(|e| CardError::io(path, e))?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Persona text for the bot prompt: description, then scenario and
    /// example dialogue when present.
    pub fn persona_prompt(&self) -> String {
        let mut prompt = self.char_persona.trim().to_string();
        if !self.world_scenario.trim().is_empty() {
            prompt.push_str("\nScenario: ");
            prompt.push_str(self.world_scenario.trim());
        }
        if !self.example_dialogue.trim().is_empty() {
            prompt.push_str("\nExample dialogue:\n");
            prompt.push_str(self.example_dialogue.trim());
        }
        prompt.replace("{{user}}", USER_PLACEHOLDER_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn v1_card_converts_to_canonical() {
        let card = TavernCard::from_json(
            br#"{"name":"Ava","description":"P","first_mes":"Hi","mes_example":"{{user}} asks {{char}}","scenario":"S"}"#,
        )
        .unwrap();

        assert_eq!(
            CharacterCard::from(card),
            CharacterCard {
                char_name: "Ava".to_string(),
                char_persona: "P".to_string(),
                char_greeting: "Hi".to_string(),
                example_dialogue: "User asks Ava".to_string(),
                world_scenario: "S".to_string(),
            }
        );
    }

    #[test]
    fn v2_envelope_is_unwrapped() {
        let card = TavernCard::from_json(
            br#"{"spec":"chara_card_v2","spec_version":"2.0","data":{"name":"Ava","description":"P","first_mes":"Hi","mes_example":"","scenario":"S","tags":[]}}"#,
        )
        .unwrap();
        assert_eq!(card.name, "Ava");
        assert_eq!(card.scenario, "S");
    }

    #[test]
    fn missing_field_is_an_error() {
        let result = TavernCard::from_json(br#"{"name":"Ava","description":"P"}"#);
        assert!(matches!(result, Err(CardError::Json(_))));
    }

    #[test]
    fn persona_prompt_includes_scenario_and_examples() {
        let card = CharacterCard {
            char_name: "Ava".to_string(),
            char_persona: "{{char}} is a ship's cat.".to_string(),
            char_greeting: "Mrrp.".to_string(),
            example_dialogue: "{{user}}: hi\nAva: mrrp".to_string(),
            world_scenario: "At sea.".to_string(),
        };
        assert_eq!(
            card.persona_prompt(),
            "{{char}} is a ship's cat.\nScenario: At sea.\nExample dialogue:\nUser: hi\nAva: mrrp"
        );
    }
}
