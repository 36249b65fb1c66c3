//! PNG text-chunk metadata

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{CardError, CardResult};

/// Text chunk keyword that holds the card JSON.
pub const CARD_KEYWORD: &str = "chara";

/// Find the text chunk named `keyword` in a PNG.
///
/// Looks at `tEXt`, `zTXt` and `iTXt` chunks, before and after the image
/// data.
pub fn read_text_chunk(png_bytes: &[u8], keyword: &str) -> CardResult<Option<String>> {
    let decoder = png::Decoder::new(Cursor::new(png_bytes));
    let mut reader = decoder.read_info()?;
    // pulls in chunks that follow IDAT
    reader.finish()?;
    let info = reader.info();

    if let Some(chunk) = info
        .uncompressed_latin1_text
        .iter()
        .find(|c| c.keyword == keyword)
    {
        return Ok(Some(chunk.text.clone()));
    }
    if let Some(chunk) = info
        .compressed_latin1_text
        .iter()
        .find(|c| c.keyword == keyword)
    {
        return Ok(Some(chunk.get_text()?));
    }
    if let Some(chunk) = info.utf8_text.iter().find(|c| c.keyword == keyword) {
        return Ok(Some(chunk.get_text()?));
    }
    Ok(None)
}

/// Decode the base64 card JSON embedded in a PNG.
pub fn extract_card_json(png_bytes: &[u8]) -> CardResult<Vec<u8>> {
    let encoded =
        read_text_chunk(png_bytes, CARD_KEYWORD)?.ok_or_else(|| CardError::MissingMetadata {
            keyword: CARD_KEYWORD.to_string(),
        })?;
    Ok(STANDARD.decode(encoded.trim())?)
}
