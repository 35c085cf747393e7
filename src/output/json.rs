//! JSON output format for findings

use crate::findings::Findings;
use serde::Serialize;

/// Findings with the fingerprint of their canonical encoding
#[derive(Debug, Serialize)]
pub struct FingerprintedFindings<'a> {
    /// SHA-256 of the compact findings JSON
    pub fingerprint: String,
    pub findings: &'a Findings,
}

/// Pretty-printed findings; wrapped with the fingerprint when requested
pub fn render(findings: &Findings, fingerprint: bool) -> anyhow::Result<String> {
    if !fingerprint {
        return findings.to_json();
    }
    let wrapped = FingerprintedFindings {
        fingerprint: findings.fingerprint()?,
        findings,
    };
    Ok(serde_json::to_string_pretty(&wrapped)?)
}
