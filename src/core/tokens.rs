use log::warn;
use tiktoken_rs::{CoreBPE, cl100k_base};

/// Counts tokens with the `cl100k_base` encoding used by the GPT-3.5/4 family.
///
/// Falls back to counting characters when the encoder cannot be built, which
/// overestimates for English text and is close for CJK text.
pub struct TokenCounter {
    encoder: Option<CoreBPE>,
}

impl TokenCounter {
    pub fn new() -> Self {
        let encoder = match cl100k_base() {
            Ok(encoder) => Some(encoder),
            Err(e) => {
                warn!("Failed to initialize encoder, counting characters instead: {e}");
                None
            }
        };
        Self { encoder }
    }

    /// Character-count only, never loads the BPE ranks.
    pub fn by_chars() -> Self {
        Self { encoder: None }
    }

    pub fn count(&self, text: &str) -> usize {
        match &self.encoder {
            Some(encoder) => encoder.encode_ordinary(text).len(),
            None => text.chars().count(),
        }
    }

    pub fn uses_encoder(&self) -> bool {
        self.encoder.is_some()
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}
