//! Text/token conversion behind a small trait.

use tokenizers::Tokenizer;

use crate::error::{Error, Result};

/// Converts between text and token ids.
pub trait TokenCodec {
    /// Encodes text without adding special tokens.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decodes one token id to its text fragment.
    fn decode(&self, token_id: u32) -> Result<String>;

    /// Number of ids the codec can decode.
    fn vocab_size(&self) -> usize;
}

impl TokenCodec for Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = (**self).encode(text, false).map_err(Error::encoding)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, token_id: u32) -> Result<String> {
        let vocab_size = TokenCodec::vocab_size(self);
        if token_id as usize >= vocab_size {
            return Err(Error::Decoding {
                token_id,
                vocab_size,
            });
        }
        (**self).decode(&[token_id], false).map_err(Error::encoding)
    }

    fn vocab_size(&self) -> usize {
        self.get_vocab_size(true)
    }
}
