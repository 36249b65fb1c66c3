use miette::Diagnostic;
use parlor_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscordError>;

#[derive(Error, Debug, Diagnostic)]
pub enum DiscordError {
    #[error("Discord bot token is not configured")]
    #[diagnostic(
        code(parlor_discord::missing_token),
        help("Set DISCORD_TOKEN (or TOKEN), or `token` under [discord] in parlor.toml")
    )]
    MissingToken,

    #[error("Discord client error: {0}")]
    #[diagnostic(code(parlor_discord::client))]
    Client(#[from] serenity::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] CoreError),
}
