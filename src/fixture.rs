use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// How a fixture's payload is written, which picks the flag handed to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Encoding {
    /// `data`, passed with `-b`
    Base64,
    /// `hexdata`, passed with `-x`
    Hex,
}

impl Encoding {
    pub(crate) fn flag(self) -> &'static str {
        match self {
            Encoding::Base64 => "-b",
            Encoding::Hex => "-x",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Payload {
    pub(crate) encoding: Encoding,
    pub(crate) data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fixture {
    pub(crate) payload: Payload,
    pub(crate) expected: Value,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum FixtureError {
    #[error("cannot read fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed fixture: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("fixture has neither `data` nor `hexdata`")]
    MissingPayloadKey,
    #[error("fixture has both `data` and `hexdata`")]
    AmbiguousPayload,
}

// on-disk shape, before the payload key is resolved; a payload key set to null counts as absent
#[derive(Deserialize)]
struct RawFixture {
    data: Option<String>,
    hexdata: Option<String>,
    expected: Value,
}

impl Fixture {
    pub(crate) fn load(path: &Path) -> Result<Self, FixtureError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub(crate) fn parse(text: &str) -> Result<Self, FixtureError> {
        let raw: RawFixture = serde_json::from_str(text)?;

        let payload = match (raw.data, raw.hexdata) {
            (Some(data), None) => Payload {
                encoding: Encoding::Base64,
                data,
            },
            (None, Some(data)) => Payload {
                encoding: Encoding::Hex,
                data,
            },
            (None, None) => return Err(FixtureError::MissingPayloadKey),
            (Some(_), Some(_)) => return Err(FixtureError::AmbiguousPayload),
        };

        Ok(Fixture {
            payload,
            expected: raw.expected,
        })
    }
}

/// Expands the command line into the ordered list of fixture files to run.
///
/// Files are kept as given. A directory contributes the `.json` files directly inside it, sorted
/// by name.
pub(crate) fn discover(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut fixtures = Vec::with_capacity(paths.len());

    for path in paths {
        if !path.is_dir() {
            fixtures.push(path.clone());
            continue;
        }

        let mut found = Vec::new();
        let entries = std::fs::read_dir(path)
            .with_context(|| format!("cannot list fixture directory {}", path.display()))?;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("cannot list fixture directory {}", path.display()))?;
            let entry = entry.path();
            if entry.is_file() && entry.extension().is_some_and(|ext| ext == "json") {
                found.push(entry);
            }
        }
        found.sort();
        fixtures.extend(found);
    }

    Ok(fixtures)
}
