#![recursion_limit = "256"]

pub mod attention;
pub mod config;
pub mod embedding;
pub mod error;
pub mod greedy_decoder;
pub mod mask;
pub mod metrics;
pub mod transformer;
pub mod translation_checkpoint;
pub mod translation_data;
pub mod translation_inference;
pub mod translation_model;
pub mod translation_training;
pub mod translation_vocabulary;

pub use error::{Result, TranslatorError};
