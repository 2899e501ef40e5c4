pub mod commands;
pub mod config;
pub mod db;
pub mod environment;
pub mod errors;
pub mod export;
pub mod ingest;
pub mod normalization;
pub mod placeholder;
pub mod recording;
pub mod sync;
pub mod validation;
