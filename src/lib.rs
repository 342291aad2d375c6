#![doc = include_str!("../README.md")]
pub mod cache;
pub mod checkpoint;
pub mod conduit;
pub mod config;
pub mod content_kind;
pub mod error;
pub mod fault_handler;
pub mod gpu_ocr;
pub mod manifest;
pub mod merkle;
pub mod model;
pub mod orchestrator;
pub mod parser_bridge;
pub mod prefetch;
pub mod progress;
pub mod record_builder;
pub mod shard;
pub mod stages;
pub mod stats;
