//! GCIQS terminal client.
//!
//! HTTP transport and health client for the query service, configuration,
//! and two front ends over the `gciqs_core` controller: a ratatui terminal UI
//! and a plain console printer for one-shot queries.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod client;
pub mod config;
pub mod console;
pub mod types;
pub mod ui;
pub mod view;

pub use client::{ClientError, QueryClient};
pub use config::{Args, ClientConfig};
pub use console::ConsoleSink;
pub use view::AnswerView;
