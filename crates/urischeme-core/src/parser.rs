//! Command-line URI parsing.
//!
//! A handler launched through its scheme receives the activating URI as a
//! command-line argument. These helpers pick the URIs out of an argument list
//! and turn them into candidate records.

use crate::error::{Result, SchemeError};
use crate::models::SchemeRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// Components of one URI argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedUri {
    pub scheme: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl ParsedUri {
    /// Candidate registration record for this URI's scheme, handled by `executable_path`.
    pub fn into_record(self, executable_path: impl Into<PathBuf>) -> SchemeRecord {
        let builder = SchemeRecord::builder(self.scheme, executable_path);
        match self.port {
            Some(port) => builder.port(port).build(),
            None => builder.build(),
        }
    }
}

/// Parse one argument as a URI.
///
/// Returns `None` for text that is not an absolute URI. Windows drive-letter
/// paths such as `C:\Users` are file arguments, not activation URIs, and are
/// skipped even though they parse as single-letter schemes.
///
/// # Errors
///
/// [`SchemeError::InvalidArgument`] if `arg` is empty.
pub fn parse_uri(arg: &str) -> Result<Option<ParsedUri>> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Err(SchemeError::invalid_argument("uri", "must not be empty"));
    }

    let url = match Url::parse(arg) {
        Ok(url) => url,
        Err(e) => {
            debug!("Skipping '{}': {}", arg, e);
            return Ok(None);
        }
    };
    if url.scheme().len() == 1 {
        debug!("Skipping drive-letter path '{}'", arg);
        return Ok(None);
    }

    Ok(Some(ParsedUri {
        scheme: url.scheme().to_string(),
        host: url.host_str().map(str::to_string),
        port: url.port(),
        path: url.path().to_string(),
        query: url.query().map(str::to_string),
        fragment: url.fragment().map(str::to_string),
    }))
}

/// Parse every argument that is a URI, silently skipping the rest.
pub fn parse_uris<I, S>(args: I) -> Vec<ParsedUri>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .filter_map(|arg| parse_uri(arg.as_ref()).ok().flatten())
        .collect()
}
