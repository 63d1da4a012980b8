// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logger setup and secret redaction.
//!
//! Every log line is written through a [`RedactingWriter`] that scrubs any
//! `key = "value"` or Python-dict-style `'key': 'value'` pair whose key
//! looks like a credential (case-insensitive `password`, `key`, `secret`,
//! `auth`, `token`, `credential`) before it ever reaches stdout.

use regex::{Captures, Regex};
use std::io;
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

fn secret_key_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(password|key|secret|auth|token|credential)").unwrap())
}

fn pair_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"'([^']*)'\s*:\s*'([^']*)'|([A-Za-z_][A-Za-z0-9_]*)\s*=\s*"([^"]*)""#)
            .unwrap()
    })
}

/// Replaces the value half of any credential-shaped key/value pair in
/// `text` with `***`. Recognizes both tracing's `key="value"` field syntax
/// and the `'key': 'value'` style the engine's own log lines sometimes
/// carry through from JSON/dict-shaped output.
pub fn redact(text: &str) -> String {
    pair_pattern()
        .replace_all(text, |caps: &Captures| {
            if let (Some(key), Some(_val)) = (caps.get(1), caps.get(2)) {
                return if secret_key_pattern().is_match(key.as_str()) {
                    format!("'{}': '***'", key.as_str())
                } else {
                    caps.get(0).unwrap().as_str().to_string()
                };
            }
            if let (Some(key), Some(_val)) = (caps.get(3), caps.get(4)) {
                return if secret_key_pattern().is_match(key.as_str()) {
                    format!("{}=\"***\"", key.as_str())
                } else {
                    caps.get(0).unwrap().as_str().to_string()
                };
            }
            caps.get(0).unwrap().as_str().to_string()
        })
        .into_owned()
}

pub struct RedactingWriter<W> {
    inner: W,
}

impl<W: io::Write> io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.inner.write_all(redact(&text).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[derive(Clone, Default)]
pub struct RedactingMakeWriter;

impl<'a> MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter<io::Stdout>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter { inner: io::stdout() }
    }
}

/// Installs the global `tracing` subscriber: `level` (e.g. `"info"`,
/// `"debug"`) seeds an [`EnvFilter`], which `RUST_LOG` can still override.
pub fn init(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(RedactingMakeWriter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_tracing_style_field() {
        let line = r#"backup=nightly api_password="hunter2" status="starting""#;
        let redacted = redact(line);
        assert!(redacted.contains(r#"api_password="***""#));
        assert!(redacted.contains(r#"status="starting""#));
    }

    #[test]
    fn redacts_python_dict_style_pair() {
        let line = "env = {'AWS_SECRET_ACCESS_KEY': 'shh', 'AWS_REGION': 'us-east-1'}";
        let redacted = redact(line);
        assert!(redacted.contains("'AWS_SECRET_ACCESS_KEY': '***'"));
        assert!(redacted.contains("'AWS_REGION': 'us-east-1'"));
    }

    #[test]
    fn leaves_non_secret_pairs_untouched() {
        let line = r#"hostname="myhost" repository="s3backup""#;
        assert_eq!(redact(line), line);
    }
}
