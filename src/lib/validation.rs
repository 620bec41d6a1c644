//! Pre-flight checks run before a contract is rendered.
//!
//! Nothing here stops generation. Each problem is reported as a human-readable
//! warning so that the caller can decide whether to continue, as the CLI does
//! for `--dry-run`.

use crate::config::Config;
use crate::renderer::RenderJob;
use crate::request::ContractRequest;
use crate::substitution::unresolved_tokens;
use std::path::Path;

/// Checks a composed job and its request for problems that would produce a
/// wrong or unsigned contract.
///
/// Reported:
/// - bracket tokens left in the body, header or footer
/// - empty company name, address or date
/// - the stamp anchor missing from the body
/// - missing signature or stamp image files
/// - no configured password
/// - an output directory that does not exist
pub fn validate_generation(
    job: &RenderJob,
    request: &ContractRequest,
    config: &Config,
    output_dir: Option<&Path>,
) -> Vec<String> {
    let mut warnings = Vec::new();

    for (part, text) in [
        ("body", &job.body),
        ("header", &job.header),
        ("footer", &job.footer),
    ] {
        let tokens = unresolved_tokens(text);
        if !tokens.is_empty() {
            warnings.push(format!(
                "Unresolved placeholders in {}: {}",
                part,
                tokens.join(", ")
            ));
        }
    }

    for (field, value) in [
        ("Company name", &request.company_name),
        ("Address", &request.address),
        ("Date", &request.date),
    ] {
        if value.trim().is_empty() {
            warnings.push(format!("{} is empty", field));
        }
    }

    if !job.body.contains(&config.layout.anchor) {
        warnings.push(format!(
            "Anchor '{}' does not appear in the contract; signature and stamp will not be placed",
            config.layout.anchor
        ));
    }

    for (label, path) in [
        ("Signature image", &config.signature_path),
        ("Stamp image", &config.stamp_path),
    ] {
        if !path.is_file() {
            warnings.push(format!("{} not found: {}", label, path.display()));
        }
    }

    if config.password.is_none() {
        warnings.push("No access password configured; generation will be refused".to_string());
    }

    if let Some(dir) = output_dir {
        if !dir.is_dir() {
            warnings.push(format!("Output directory does not exist: {}", dir.display()));
        }
    }

    warnings
}
