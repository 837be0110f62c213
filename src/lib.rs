//! AI PM Dashboard - backend for an AI tool catalog and news digest
//!
//! This crate serves a static catalog of AI tools, aggregates AI news from
//! RSS feeds with model-generated summaries, and answers chat questions
//! through the Gemini API with optional catalog context.

pub mod catalog;
pub mod chat;
pub mod config;
pub mod fetcher;
pub mod gemini;
pub mod news;
pub mod routes;
