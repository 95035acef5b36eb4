//! animated-image library crate.
//!
//! Turns a text prompt into a still image and then into a short video using
//! Google's generative media models.

pub mod cli;
pub mod config;
pub mod genai;
pub mod output;
