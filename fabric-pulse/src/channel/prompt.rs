//! Arista EOS prompt detection and CLI output cleanup.
//!
//! Prompt patterns follow the EOS conventions:
//!
//! ```text
//! leaf1>                            # exec
//! leaf1#                            # privileged exec
//! leaf1(config)#                    # configuration
//! leaf1(config-if-Et1)#             # configuration sub-mode
//! ```

use memchr::memmem;
use regex::bytes::Regex;

/// Output markers EOS prints when it rejects a command.
pub const FAILURE_PATTERNS: &[&str] = &[
    "% Ambiguous command",
    "% Error",
    "% Incomplete command",
    "% Invalid input",
    "% Cannot commit",
    "% Unavailable command",
];

/// Any EOS prompt, anchored to the end of the buffer.
const PROMPT: &str = r"(?m)^[\w.\-@()/: ]{1,63}[>#]\s?\z";

/// The `enable` password prompt.
const PASSWORD: &str = r"(?mi)^password:\s?\z";

/// CLI mode derived from a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// `>` prompt.
    Exec,
    /// `#` prompt outside configuration mode.
    Privileged,
    /// `(config...)#` prompt.
    Configuration,
}

impl PromptMode {
    /// Classify a prompt string.
    pub fn of(prompt: &str) -> Self {
        let prompt = prompt.trim_end();
        if prompt.ends_with('>') {
            Self::Exec
        } else if prompt.contains("(config") {
            Self::Configuration
        } else {
            Self::Privileged
        }
    }
}

/// Compiled prompt patterns for an EOS CLI session.
#[derive(Debug, Clone)]
pub struct Prompts {
    prompt: Regex,
    prompt_or_password: Regex,
}

impl Prompts {
    /// Compile the EOS prompt patterns.
    pub fn eos() -> Result<Self, regex::Error> {
        Ok(Self {
            prompt: Regex::new(PROMPT)?,
            prompt_or_password: Regex::new(&format!("(?:{PROMPT})|(?:{PASSWORD})"))?,
        })
    }

    /// Pattern matching any CLI prompt.
    pub fn prompt(&self) -> &Regex {
        &self.prompt
    }

    /// Pattern matching either a CLI prompt or the `enable` password prompt.
    pub fn prompt_or_password(&self) -> &Regex {
        &self.prompt_or_password
    }

    /// Extract the trailing prompt from a chunk of output.
    pub fn trailing_prompt(&self, data: &[u8]) -> Option<String> {
        self.prompt
            .find(data)
            .map(|m| String::from_utf8_lossy(m.as_bytes()).trim().to_string())
    }

    /// Strip the command echo (first line) and the trailing prompt.
    pub fn command_output(&self, data: &[u8]) -> String {
        let end = self.prompt.find(data).map_or(data.len(), |m| m.start());
        let body = &data[..end];
        let body = match memchr::memchr(b'\n', body) {
            Some(pos) => &body[pos + 1..],
            None => &[],
        };
        String::from_utf8_lossy(body).into_owned()
    }
}

/// Return the first EOS failure marker found in the output.
pub fn detect_failure(output: &str) -> Option<&'static str> {
    FAILURE_PATTERNS
        .iter()
        .copied()
        .find(|pattern| memmem::find(output.as_bytes(), pattern.as_bytes()).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_matches_modes() {
        let prompts = Prompts::eos().unwrap();
        assert!(prompts.prompt().is_match(b"leaf1>"));
        assert!(prompts.prompt().is_match(b"leaf1# "));
        assert!(prompts.prompt().is_match(b"output\nleaf1(config-if-Et1)#"));
        assert!(prompts.prompt().is_match(b"admin@leaf1.lab#"));
    }

    #[test]
    fn test_prompt_must_end_buffer() {
        let prompts = Prompts::eos().unwrap();
        assert!(!prompts.prompt().is_match(b"leaf1#\nmore output"));
        assert!(!prompts.prompt().is_match(b"router bgp 65101"));
    }

    #[test]
    fn test_password_prompt() {
        let prompts = Prompts::eos().unwrap();
        assert!(prompts.prompt_or_password().is_match(b"enable\nPassword: "));
        assert!(prompts.prompt_or_password().is_match(b"enable\nleaf1#"));
        assert!(!prompts.prompt().is_match(b"enable\nPassword: "));
    }

    #[test]
    fn test_prompt_mode() {
        assert_eq!(PromptMode::of("leaf1>"), PromptMode::Exec);
        assert_eq!(PromptMode::of("leaf1#"), PromptMode::Privileged);
        assert_eq!(PromptMode::of("leaf1(config)#"), PromptMode::Configuration);
        assert_eq!(PromptMode::of("leaf1(config-router-bgp)# "), PromptMode::Configuration);
    }

    #[test]
    fn test_command_output() {
        let prompts = Prompts::eos().unwrap();
        let raw = b"show hostname\nHostname: leaf1\nFQDN:     leaf1.lab\nleaf1#";
        assert_eq!(
            prompts.command_output(raw),
            "Hostname: leaf1\nFQDN:     leaf1.lab\n"
        );
        assert_eq!(prompts.trailing_prompt(raw).as_deref(), Some("leaf1#"));
    }

    #[test]
    fn test_command_output_without_body() {
        let prompts = Prompts::eos().unwrap();
        assert_eq!(prompts.command_output(b"terminal length 0\nleaf1#"), "");
    }

    #[test]
    fn test_detect_failure() {
        assert_eq!(
            detect_failure("% Invalid input (at token 1: 'foo')"),
            Some("% Invalid input")
        );
        assert_eq!(detect_failure("Copy completed successfully."), None);
    }
}
