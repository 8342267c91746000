//! The stateful chat wrapper: transcript, response cache and running fee.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{debug, info, warn};

use super::cache::{CacheKey, ResponseCache};
use super::history::{ChatMessage, Transcript};
use super::pricing::PricingTable;
use super::provider::ChatProvider;
use super::tokens::TokenCounter;
use crate::error::{ChatError, Result};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_CACHE_DIR: &str = "./chatgpt/";

/// Prompt used to condense a long conversation ("please summarize the
/// conversation so far").
pub const SUMMARY_PROMPT: &str = "今までの会話を要約してください。";

const OUTPUT_ESTIMATE_RATIO: f64 = 1.1;
const OUTPUT_ESTIMATE_OVERHEAD: f64 = 20.0;

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model_name: String,
    pub embedding_model_name: String,
    /// Keep the transcript between calls.
    pub interactive: bool,
    /// Load all shards on construction and save one after every billed call.
    pub auto_saveload: bool,
    pub cache_dir: PathBuf,
    pub pricing: PricingTable,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            embedding_model_name: DEFAULT_EMBEDDING_MODEL.to_string(),
            interactive: true,
            auto_saveload: true,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            pricing: PricingTable::default(),
        }
    }
}

/// Result of a single [`Chat::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub content: String,
    /// Dollar cost of this call; zero for cache hits.
    pub price: f64,
    pub cached: bool,
}

pub struct Chat {
    provider: Box<dyn ChatProvider>,
    model_name: String,
    embedding_model_name: String,
    interactive: bool,
    auto_saveload: bool,
    cache_dir: PathBuf,
    pricing: PricingTable,
    fee: f64,
    cache: ResponseCache,
    history: Transcript,
    token_counter: OnceLock<TokenCounter>,
}

/// Only zero-temperature replies are reproducible enough to memoize.
#[allow(clippy::float_cmp)]
fn is_deterministic(temperature: f32) -> bool {
    temperature == 0.0
}

/// Rough cost of sending `message` to `model`, assuming the reply is
/// slightly longer than the request. `None` if the model is unpriced.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn estimate_cost(
    pricing: &PricingTable,
    model: &str,
    counter: &TokenCounter,
    message: &str,
) -> Option<f64> {
    let input_tokens = counter.count(message) as f64;
    let output_tokens = input_tokens * OUTPUT_ESTIMATE_RATIO + OUTPUT_ESTIMATE_OVERHEAD;
    pricing
        .get(model)
        .map(|p| p.cost(input_tokens, output_tokens))
}

impl Chat {
    pub fn new(provider: Box<dyn ChatProvider>, options: ChatOptions) -> Result<Self> {
        std::fs::create_dir_all(&options.cache_dir)
            .map_err(|e| ChatError::cache_io(&options.cache_dir, e))?;

        let mut chat = Self {
            provider,
            model_name: options.model_name,
            embedding_model_name: options.embedding_model_name,
            interactive: options.interactive,
            auto_saveload: options.auto_saveload,
            cache_dir: options.cache_dir,
            pricing: options.pricing,
            fee: 0.0,
            cache: ResponseCache::new(),
            history: Transcript::new(),
            token_counter: OnceLock::new(),
        };

        if chat.auto_saveload {
            chat.load(None)?;
        }
        Ok(chat)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn embedding_model_name(&self) -> &str {
        &self.embedding_model_name
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    /// Total dollars spent through this instance.
    pub fn fee(&self) -> f64 {
        self.fee
    }

    pub fn history(&self) -> &Transcript {
        &self.history
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Persist the cache as a new timestamped shard.
    pub fn save(&self) -> Result<PathBuf> {
        self.cache.save_shard(&self.cache_dir)
    }

    /// Merge one shard, or every shard in the cache directory when `path`
    /// is `None`.
    pub fn load(&mut self, path: Option<&Path>) -> Result<()> {
        match path {
            Some(path) => self.cache.load_shard(path),
            None => {
                let shards = self.cache.load_dir(&self.cache_dir)?;
                debug!(
                    "Loaded {shards} shards, {} cached responses",
                    self.cache.len()
                );
                Ok(())
            }
        }
    }

    /// Dollar cost of a call to the current chat model, `None` if unpriced.
    pub fn calculate_price(&self, input_tokens: u64, output_tokens: u64) -> Option<f64> {
        self.pricing
            .calculate(&self.model_name, input_tokens, output_tokens)
    }

    /// Rough cost of sending `message`, assuming the reply is slightly
    /// longer than the request.
    pub fn estimate_price(&self, message: &str) -> Option<f64> {
        estimate_cost(
            &self.pricing,
            &self.model_name,
            self.token_counter(),
            message,
        )
    }

    fn token_counter(&self) -> &TokenCounter {
        self.token_counter.get_or_init(TokenCounter::new)
    }

    /// Send `message` with default settings (temperature 0).
    pub async fn ask(&mut self, message: impl Into<String>) -> Result<Reply> {
        self.send(message, 0.0, false).await
    }

    /// Send one user message and record the turn.
    ///
    /// `temporary_interactive` keeps the transcript for this call only,
    /// without touching the configured interactive flag.
    pub async fn send(
        &mut self,
        message: impl Into<String>,
        temperature: f32,
        temporary_interactive: bool,
    ) -> Result<Reply> {
        let message = message.into();
        let interactive = self.interactive || temporary_interactive;

        if !interactive {
            self.history.clear();
        }

        let cacheable = is_deterministic(temperature);
        if self.history.is_empty()
            && cacheable
            && let Some(cached) = self.cache.get(&self.model_name, &message)
        {
            debug!("Cache hit for {}", self.model_name);
            let content = cached.to_string();
            self.history.push_turn(message, content.clone());
            return Ok(Reply {
                content,
                price: 0.0,
                cached: true,
            });
        }

        let outgoing = self.history.with_pending(&ChatMessage::user(message.as_str()));
        let completion = self
            .provider
            .chat(&self.model_name, &outgoing, temperature)
            .await?;

        // Both halves go in together, only after the round trip succeeded.
        self.history
            .push_turn(message.as_str(), completion.content.as_str());

        if self.history.len() == 2 && cacheable {
            self.cache.insert(
                CacheKey::new(self.model_name.as_str(), message),
                completion.content.as_str(),
            );
        }

        let price = self
            .calculate_price(
                completion.usage.prompt_tokens,
                completion.usage.completion_tokens,
            )
            .unwrap_or_else(|| {
                warn!("No pricing for model {}, billing zero", self.model_name);
                0.0
            });
        self.fee += price;
        info!(
            "{}: {} prompt + {} completion tokens, ${price:.6}",
            self.model_name, completion.usage.prompt_tokens, completion.usage.completion_tokens
        );

        if self.auto_saveload
            && let Err(e) = self.save()
        {
            warn!("Failed to save response cache: {e}");
        }

        Ok(Reply {
            content: completion.content,
            price,
            cached: false,
        })
    }

    /// Condense the conversation into a single summary turn.
    pub async fn summarize_and_clear_history(&mut self) -> Result<Reply> {
        let reply = self.send(SUMMARY_PROMPT, 0.0, true).await?;
        self.history.keep_last_turn();
        Ok(reply)
    }

    /// Embedding vector for a single piece of text.
    pub async fn embedding(&mut self, query: &str) -> Result<(Vec<f32>, f64)> {
        let (vectors, price) = self.embeddings(&[query]).await?;
        let vector = vectors.into_iter().next().ok_or(ChatError::EmptyResponse)?;
        Ok((vector, price))
    }

    /// Embedding vectors for several texts, fetched in one request.
    pub async fn embeddings<S: AsRef<str>>(
        &mut self,
        queries: &[S],
    ) -> Result<(Vec<Vec<f32>>, f64)> {
        if queries.is_empty() {
            return Ok((Vec::new(), 0.0));
        }

        let inputs: Vec<String> = queries
            .iter()
            .map(|q| q.as_ref().replace('\n', " "))
            .collect();

        let embeddings = self
            .provider
            .embed(&self.embedding_model_name, &inputs)
            .await?;
        if embeddings.vectors.len() != inputs.len() {
            return Err(ChatError::EmbeddingCount {
                expected: inputs.len(),
                got: embeddings.vectors.len(),
            });
        }

        let price = self
            .pricing
            .embedding_cost(&self.embedding_model_name, embeddings.total_tokens)
            .unwrap_or_else(|| {
                warn!(
                    "No pricing for embedding model {}, billing zero",
                    self.embedding_model_name
                );
                0.0
            });
        self.fee += price;
        debug!(
            "Embedded {} inputs with {}, ${price:.6}",
            inputs.len(),
            self.embedding_model_name
        );

        Ok((embeddings.vectors, price))
    }
}

impl fmt::Display for Chat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.history, f)
    }
}
