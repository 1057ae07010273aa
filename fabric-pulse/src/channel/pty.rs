//! PTY channel abstraction for interactive CLI sessions.

use std::time::Duration;

use bytes::Bytes;
use log::trace;
use regex::bytes::Regex;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

use super::buffer::PatternBuffer;
use crate::error::ConnectionError;

/// Configuration for PTY channel behavior.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Deadline for each read-until-prompt.
    pub timeout: Duration,

    /// Search depth for pattern matching.
    pub search_depth: usize,

    /// Terminal width.
    pub terminal_width: u32,

    /// Terminal height.
    pub terminal_height: u32,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            search_depth: 1000,
            terminal_width: 32767,
            terminal_height: 24,
        }
    }
}

/// An open shell channel with a pattern buffer in front of it.
pub struct PtyChannel {
    channel: Channel<Msg>,
    buffer: PatternBuffer,
    timeout: Duration,
}

impl PtyChannel {
    /// Wrap an already opened shell channel.
    pub fn new(channel: Channel<Msg>, config: &PtyConfig) -> Self {
        Self {
            channel,
            buffer: PatternBuffer::new(config.search_depth),
            timeout: config.timeout,
        }
    }

    /// Send a line (a newline is appended).
    pub async fn send_line(&mut self, line: &str) -> Result<(), ConnectionError> {
        trace!("pty <- {:?}", line);
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.channel.data(&data[..]).await?;
        Ok(())
    }

    /// Read until `pattern` matches the buffer tail, then hand back everything
    /// read so far.
    pub async fn read_until(&mut self, pattern: &Regex) -> Result<Bytes, ConnectionError> {
        let deadline = tokio::time::Instant::now() + self.timeout;

        loop {
            if self.buffer.tail_contains(pattern) {
                return Ok(self.buffer.take());
            }

            match tokio::time::timeout_at(deadline, self.channel.wait()).await {
                Err(_) => return Err(ConnectionError::Timeout(self.timeout)),
                Ok(Some(ChannelMsg::Data { data })) => {
                    trace!("pty -> {} bytes", data.len());
                    self.buffer.extend(&data);
                }
                Ok(Some(ChannelMsg::Eof | ChannelMsg::Close)) | Ok(None) => {
                    return Err(ConnectionError::Closed);
                }
                Ok(Some(_)) => {}
            }
        }
    }

    /// Signal end of input and drop the channel.
    pub async fn close(self) {
        if let Err(e) = self.channel.eof().await {
            trace!("pty eof failed: {}", e);
        }
    }
}
