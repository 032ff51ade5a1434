pub mod config;
pub mod deck;
pub mod export;
pub mod llm;
pub mod pipeline;
pub mod terminal;
