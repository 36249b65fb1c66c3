//! `parlor bot`

use std::sync::Arc;

use miette::{Result, miette};
use parlor_cards::CharacterCard;
use parlor_core::model::parlor_reqwest_client;
use parlor_core::{ConversationOrchestrator, EndpointHandle, ParlorConfig};
use parlor_discord::{DiscordBot, DiscordError};
use tracing::{info, warn};

/// Take name and persona from the configured character card, if any.
pub fn apply_character(config: &mut ParlorConfig) -> Result<()> {
    let Some(path) = config.persona.character.clone() else {
        return Ok(());
    };
    let card = CharacterCard::load(&path)?;
    info!("Using character '{}' from {}", card.char_name, path.display());
    config.persona.name = card.char_name.clone();
    config.persona.prompt = card.persona_prompt();
    Ok(())
}

/// Run the Discord bot until the client stops.
pub async fn run(mut config: ParlorConfig) -> Result<()> {
    apply_character(&mut config)?;
    config.validate()?;
    if config.discord.token.is_none() {
        return Err(DiscordError::MissingToken.into());
    }

    let url = config
        .endpoint
        .url
        .as_deref()
        .ok_or_else(|| miette!("No inference endpoint configured"))?;
    let http = parlor_reqwest_client(config.endpoint.timeout());
    let endpoint = Arc::new(EndpointHandle::with_client(
        url,
        config.endpoint.generation,
        http,
    ));

    match endpoint.probe().await {
        Ok(protocol) => info!("Endpoint {} speaks {}", endpoint.base_url(), protocol),
        Err(e) => warn!("{}; every message will be rejected until restart", e),
    }

    let orchestrator = ConversationOrchestrator::new(
        config.persona.name.clone(),
        config.persona.template()?,
        endpoint,
        config.persona.stop_set(),
        &config.memory,
    );
    info!("Starting Discord bot as '{}'", orchestrator.bot_name());

    DiscordBot::new(Arc::new(orchestrator), config.discord)
        .run()
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn character_card_sets_persona() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Ava.json");
        std::fs::write(
            &path,
            r#"{"char_name":"Ava","char_persona":"{{char}} is a ship's cat.","char_greeting":"","example_dialogue":"","world_scenario":"At sea."}"#,
        )
        .unwrap();

        let mut config = ParlorConfig::default();
        config.persona.character = Some(path);
        apply_character(&mut config).unwrap();

        assert_eq!(config.persona.name, "Ava");
        assert_eq!(config.persona.prompt, "{{char}} is a ship's cat.\nScenario: At sea.");
    }

    #[test]
    fn no_character_leaves_persona_alone() {
        let mut config = ParlorConfig::default();
        apply_character(&mut config).unwrap();
        assert_eq!(config.persona.name, "Assistant");
    }
}
