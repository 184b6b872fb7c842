//! Tenerate — generate unit tests for the function under the cursor.
//!
//! Sends the document to a remote generation service, polls until the result
//! is ready, and appends the generated tests to the end of the document.

pub mod client;
pub mod command;
pub mod config;
pub mod document;
pub mod language;
pub mod notify;
pub mod workflow;
