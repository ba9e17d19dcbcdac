use crate::fixture::Payload;
use owo_colors::OwoColorize;
use serde_json::Value;
use std::process::{Command, ExitStatus, Stdio};

// longest stretch of unparsable output quoted back in a diagnostic
const EXCERPT_LEN: usize = 60;

/// Turns an encoded payload into the decoded document.
pub(crate) trait Decoder {
    fn decode(&mut self, payload: &Payload) -> Result<Value, DecodeError>;
}

impl<D: Decoder + ?Sized> Decoder for &mut D {
    fn decode(&mut self, payload: &Payload) -> Result<Value, DecodeError> {
        (**self).decode(payload)
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum DecodeError {
    #[error("cannot run decoder `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("decoder output is not valid JSON ({source}): {excerpt:?}")]
    DecodeOutputUnparsable {
        source: serde_json::Error,
        excerpt: String,
    },
    #[error("decoder {status}")]
    DecoderFailed { status: ExitStatus },
}

impl DecodeError {
    /// Whether the decoder could not be reached at all, as opposed to a bad answer for one
    /// payload.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(self, DecodeError::Spawn { .. })
    }
}

// Talks to a decoder that's run as an external process, once per payload
pub(crate) struct ExternalDriver {
    program: String,
    check_status: bool,
    logging: bool,
}

impl ExternalDriver {
    pub(crate) fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            check_status: false,
            logging: false,
        }
    }

    /// Fail payloads whose decoder run exits unsuccessfully instead of only looking at stdout.
    pub(crate) fn check_status(mut self) -> Self {
        self.check_status = true;
        self
    }

    pub(crate) fn log(mut self) -> Self {
        self.logging = true;
        self
    }

    fn command(&self, payload: &Payload) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["decode", payload.encoding.flag(), &payload.data])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            // the decoder's diagnostics go straight to ours
            .stderr(Stdio::inherit());
        cmd
    }
}

impl Decoder for ExternalDriver {
    fn decode(&mut self, payload: &Payload) -> Result<Value, DecodeError> {
        let mut cmd = self.command(payload);

        if self.logging {
            eprintln!("{} {cmd:?}", " TX ".black().on_purple());
        }

        let output = cmd.output().map_err(|source| DecodeError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if self.logging {
            let stdout = String::from_utf8_lossy(&output.stdout);
            eprintln!("{} {}", " RX ".black().on_blue(), stdout.trim_end().blue());
        }

        if self.check_status && !output.status.success() {
            return Err(DecodeError::DecoderFailed {
                status: output.status,
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|source| {
            DecodeError::DecodeOutputUnparsable {
                source,
                excerpt: String::from_utf8_lossy(&output.stdout)
                    .chars()
                    .take(EXCERPT_LEN)
                    .collect(),
            }
        })
    }
}

// Answers from a fixed table instead of a process, recording what it was asked
#[cfg(test)]
#[derive(Default)]
pub(crate) struct StubDriver {
    answers: std::collections::HashMap<String, StubAnswer>,
    pub(crate) calls: Vec<Payload>,
}

#[cfg(test)]
enum StubAnswer {
    Value(Value),
    Output(String),
    Unreachable,
}

#[cfg(test)]
impl StubDriver {
    pub(crate) fn answer(mut self, data: &str, value: Value) -> Self {
        self.answers.insert(data.to_owned(), StubAnswer::Value(value));
        self
    }

    /// Reply to `data` with raw, unparsable output.
    pub(crate) fn garble(mut self, data: &str, output: &str) -> Self {
        self.answers
            .insert(data.to_owned(), StubAnswer::Output(output.to_owned()));
        self
    }

    /// Behave as if the decoder could not be started when asked for `data`.
    pub(crate) fn unreachable(mut self, data: &str) -> Self {
        self.answers.insert(data.to_owned(), StubAnswer::Unreachable);
        self
    }
}

#[cfg(test)]
impl Decoder for StubDriver {
    fn decode(&mut self, payload: &Payload) -> Result<Value, DecodeError> {
        self.calls.push(payload.clone());

        let output = match self.answers.get(&payload.data) {
            Some(StubAnswer::Value(value)) => return Ok(value.clone()),
            Some(StubAnswer::Output(output)) => output.clone(),
            Some(StubAnswer::Unreachable) => {
                return Err(DecodeError::Spawn {
                    program: "stub".into(),
                    source: std::io::ErrorKind::NotFound.into(),
                })
            }
            None => String::new(),
        };
        serde_json::from_str(&output).map_err(|source| DecodeError::DecodeOutputUnparsable {
            source,
            excerpt: output,
        })
    }
}
