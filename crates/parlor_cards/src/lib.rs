//! Parlor Cards - character card import
//!
//! Character cards are PNG images carrying a base64 JSON description of a
//! persona in a `chara` text chunk. This crate:
//! - Reads the embedded metadata from `tEXt`, `zTXt` or `iTXt` chunks
//! - Converts the frontend field layout (V1 or V2) to canonical JSON
//! - Imports single files or whole directories, one failure at a time

pub mod card;
pub mod embedded;
pub mod error;
pub mod import;

pub use card::{CharacterCard, TavernCard};
pub use embedded::{CARD_KEYWORD, extract_card_json, read_text_chunk};
pub use error::{CardError, CardResult};
pub use import::{CardImporter, ImportReport, ImportedCard};
