//! PTY channel for interactive device sessions.

use std::time::Duration;

use bytes::Bytes;
use log::trace;
use regex::bytes::Regex;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use crate::error::{ChannelError, Result};

/// Output read up to (and excluding) a matched prompt.
#[derive(Debug)]
pub struct ReadResult {
    /// Everything received before the prompt.
    pub data: Bytes,

    /// The matched prompt, trimmed.
    pub prompt: String,
}

impl ReadResult {
    /// Get the data as a string (lossy UTF-8).
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Interactive shell channel with pattern-based reads.
pub struct PtyChannel {
    channel: Channel<Msg>,
    buffer: PatternBuffer,
}

impl PtyChannel {
    /// Wrap an already opened shell channel.
    pub fn new(channel: Channel<Msg>, search_depth: usize) -> Self {
        Self {
            channel,
            buffer: PatternBuffer::new(search_depth),
        }
    }

    /// Send one line of input.
    pub async fn send(&mut self, input: &str) -> Result<()> {
        trace!("send: {:?}", input);
        self.write_line(input.as_bytes()).await
    }

    /// Send one line of input without logging it.
    pub async fn send_secret(&mut self, secret: &SecretString) -> Result<()> {
        trace!("send: <hidden>");
        self.write_line(secret.expose_secret().as_bytes()).await
    }

    async fn write_line(&mut self, input: &[u8]) -> Result<()> {
        let mut line = Vec::with_capacity(input.len() + 1);
        line.extend_from_slice(input);
        line.push(b'\n');
        self.channel
            .data(&line[..])
            .await
            .map_err(ChannelError::Ssh)?;
        Ok(())
    }

    /// Read until `pattern` matches at the end of the output.
    ///
    /// Fails with [`ChannelError::PatternTimeout`] if the pattern has not
    /// shown up within `timeout`, and with [`ChannelError::Closed`] if the
    /// device hangs up first.
    pub async fn read_until(&mut self, pattern: &Regex, timeout: Duration) -> Result<ReadResult> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(range) = self.buffer.find_trailing(pattern) {
                let mut data = self.buffer.take();
                let prompt = String::from_utf8_lossy(&data[range.clone()])
                    .trim()
                    .to_string();
                data.truncate(range.start);
                trace!("matched prompt {:?} after {} bytes", prompt, data.len());
                return Ok(ReadResult { data, prompt });
            }

            let msg = tokio::time::timeout_at(deadline, self.channel.wait())
                .await
                .map_err(|_| ChannelError::PatternTimeout(timeout))?;

            match msg {
                Some(ChannelMsg::Data { data }) => self.buffer.extend(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => self.buffer.extend(&data),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(ChannelError::Closed.into());
                }
                Some(_) => {}
            }
        }
    }

    /// Discard anything received but not yet read.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Close the channel.
    pub async fn close(self) -> Result<()> {
        self.channel.close().await.map_err(ChannelError::Ssh)?;
        Ok(())
    }
}
