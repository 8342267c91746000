pub mod config;
pub mod core;
pub mod error;
pub mod logger;

pub use config::Config;
pub use crate::core::cache::{CacheKey, ResponseCache};
pub use crate::core::chat::{Chat, ChatOptions, Reply};
pub use crate::core::history::{ChatMessage, Role, Transcript};
pub use crate::core::pricing::{ModelPricing, PricingTable};
pub use crate::core::provider::{ChatProvider, ChatUsage, Completion, Embeddings, OpenAiProvider};
pub use error::ChatError;
pub use logger::init_logger;
