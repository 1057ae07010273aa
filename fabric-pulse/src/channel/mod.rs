//! Channel layer for the SSH CLI transport.
//!
//! Prompt detection over a tail-searched buffer, ANSI stripping, and the
//! EOS-specific prompt and failure patterns.

mod buffer;
mod prompt;
mod pty;

pub use buffer::PatternBuffer;
pub use prompt::{FAILURE_PATTERNS, PromptMode, Prompts, detect_failure};
pub use pty::{PtyChannel, PtyConfig};
