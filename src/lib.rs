//! `scamdrill` - scam and phishing recognition drills
//!
//! A game session engine: the player judges emails, web pages, text
//! messages and calls as scam or legitimate under a countdown, with an
//! occasional timed reflex round in between.

pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod observability;
pub mod session;
