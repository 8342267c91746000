pub mod cache;
pub mod chat;
pub mod history;
pub mod pricing;
pub mod provider;
pub mod tokens;
