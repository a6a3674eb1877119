//! Minimal PEM block extraction.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub(crate) struct PemBlock {
    pub label: String,
    /// The block verbatim, armour lines included.
    pub text: String,
}

impl PemBlock {
    pub fn der(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let body: String = self
            .text
            .lines()
            .filter(|l| !l.starts_with("-----"))
            .map(str::trim)
            .collect();
        STANDARD.decode(body)
    }
}

/// Split PEM text into its `-----BEGIN x-----` / `-----END x-----` blocks.
pub(crate) fn blocks(text: &str) -> Vec<PemBlock> {
    let mut out = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(label) = line
            .strip_prefix("-----BEGIN ")
            .and_then(|l| l.strip_suffix("-----"))
        {
            current = Some((label.to_string(), vec![line]));
        } else if line.starts_with("-----END ") {
            if let Some((label, mut lines)) = current.take() {
                lines.push(line);
                out.push(PemBlock {
                    label,
                    text: lines.join("\n") + "\n",
                });
            }
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    out
}
