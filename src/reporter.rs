use crate::config::Config;
use crate::error::ReportError;
use crate::extractor::AnnotatedLine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

const NOTHING_TO_DO: &str = "No errors found or unable to process log file.";
const INVALID_UNIT: &str = "Error: Invalid JSON response";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct GenerateRecord {
    #[serde(default)]
    response: String,
    done: bool,
}

/// One decoded line of the streamed generate response.
#[derive(Debug)]
pub enum StreamChunk {
    Text(String),
    Done,
    Malformed(serde_json::Error),
}

impl StreamChunk {
    pub fn decode(line: &[u8]) -> Self {
        match serde_json::from_slice::<GenerateRecord>(line) {
            Ok(record) if record.done => StreamChunk::Done,
            Ok(record) => StreamChunk::Text(record.response),
            Err(e) => StreamChunk::Malformed(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A record with `done: true` was seen; anything after it was left unread.
    Completed,
    /// The body ended before any `done` record arrived.
    Exhausted,
}

pub fn build_prompt(lines: &[AnnotatedLine]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Longest response unit buffered while waiting for its newline.
pub const MAX_UNIT_BYTES: usize = 1 << 20;

/// Turns a streamed NDJSON body into console text.
pub struct StreamRenderer {
    pending: Vec<u8>,
    limit: usize,
    /// Dropping an oversized unit until its terminating newline shows up.
    skipping: bool,
    line_open: bool,
}

impl Default for StreamRenderer {
    fn default() -> Self {
        Self::with_limit(MAX_UNIT_BYTES)
    }
}

impl StreamRenderer {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
            skipping: false,
            line_open: false,
        }
    }

    /// Whether generated text is on the console with no line break after it yet.
    pub fn line_open(&self) -> bool {
        self.line_open
    }

    /// Writes each text fragment to `out` as it arrives and stops at the first `done` record.
    pub async fn render<S, B, E, W>(&mut self, stream: S, out: &mut W) -> Result<StreamOutcome, ReportError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        ReportError: From<E>,
        W: AsyncWrite + Unpin,
    {
        let mut stream = std::pin::pin!(stream);

        while let Some(bytes) = stream.next().await {
            let mut bytes = bytes?.as_ref().to_vec();

            if self.skipping {
                match bytes.iter().position(|&b| b == b'\n') {
                    Some(pos) => {
                        bytes.drain(..=pos);
                        self.skipping = false;
                    }
                    None => continue,
                }
            }
            self.pending.extend_from_slice(&bytes);

            while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                if self.render_line(&line, out).await? {
                    return Ok(StreamOutcome::Completed);
                }
            }

            if self.pending.len() > self.limit {
                warn!(bytes = self.pending.len(), "response unit exceeds size limit");
                self.pending.clear();
                self.skipping = true;
                out.write_all(format!("{INVALID_UNIT}\n").as_bytes()).await?;
                self.line_open = false;
            }
        }

        // Last record may lack a trailing newline.
        let rest = std::mem::take(&mut self.pending);
        if self.render_line(&rest, out).await? {
            return Ok(StreamOutcome::Completed);
        }
        Ok(StreamOutcome::Exhausted)
    }

    async fn render_line<W>(&mut self, line: &[u8], out: &mut W) -> Result<bool, ReportError>
    where
        W: AsyncWrite + Unpin,
    {
        let line = line.trim_ascii();
        if line.is_empty() {
            return Ok(false);
        }

        match StreamChunk::decode(line) {
            StreamChunk::Text(text) => {
                out.write_all(text.as_bytes()).await?;
                out.flush().await?;
                self.line_open |= !text.is_empty();
                Ok(false)
            }
            StreamChunk::Done => Ok(true),
            StreamChunk::Malformed(e) => {
                warn!(error = %e, "skipping undecodable response unit");
                out.write_all(format!("{INVALID_UNIT}\n").as_bytes()).await?;
                self.line_open = false;
                Ok(false)
            }
        }
    }
}

pub async fn render_stream<S, B, E, W>(stream: S, out: &mut W) -> Result<StreamOutcome, ReportError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    ReportError: From<E>,
    W: AsyncWrite + Unpin,
{
    StreamRenderer::default().render(stream, out).await
}

pub struct Reporter {
    config: Config,
    client: reqwest::Client,
}

impl Reporter {
    pub fn new(config: Config, timeout: Option<Duration>) -> Result<Self, ReportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            config,
            client: builder.build()?,
        })
    }

    /// Sends the extracted lines for analysis and streams the answer to `out`.
    ///
    /// Transport failures are printed, not returned; only a broken console is an error here.
    pub async fn report<W>(
        &self,
        lines: Option<&[AnnotatedLine]>,
        out: &mut W,
    ) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(lines) = lines.filter(|lines| !lines.is_empty()) else {
            out.write_all(format!("{NOTHING_TO_DO}\n").as_bytes()).await?;
            return out.flush().await;
        };

        let prompt = build_prompt(lines);
        debug!(lines = lines.len(), bytes = prompt.len(), model = %self.config.model, "sending prompt");

        let mut renderer = StreamRenderer::default();
        match self.generate(&prompt, &mut renderer, out).await {
            Ok(outcome) => {
                if outcome == StreamOutcome::Exhausted {
                    warn!("response ended without a done record");
                }
                out.write_all(b"\n").await?;
            }
            Err(e @ ReportError::Transport(_)) => {
                // Partial text has no line break of its own.
                if renderer.line_open() {
                    out.write_all(b"\n").await?;
                }
                out.write_all(format!("{e}\n").as_bytes()).await?;
            }
            Err(ReportError::Console(e)) => return Err(e),
        }
        out.flush().await
    }

    pub async fn generate<W>(
        &self,
        prompt: &str,
        renderer: &mut StreamRenderer,
        out: &mut W,
    ) -> Result<StreamOutcome, ReportError>
    where
        W: AsyncWrite + Unpin,
    {
        let request = GenerateRequest {
            prompt,
            model: &self.config.model,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        // The body stream owns the connection and is dropped on every return path below.
        renderer.render(response.bytes_stream(), out).await
    }
}
