//! Template resources for the contract document.
//!
//! Four UTF-8 markup files make up a contract:
//! - `template.html` - the contract body
//! - `header.html` - running header repeated on every page
//! - `footer.html` - running footer repeated on every page
//! - `signatures.html` - signature block appended after the body
//!
//! A default set is compiled into the binary. A directory containing all four
//! files can replace it at runtime.

use crate::ContractError;
use log::debug;
use rust_embed::RustEmbed;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(RustEmbed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

pub const BODY_FILE: &str = "template.html";
pub const HEADER_FILE: &str = "header.html";
pub const FOOTER_FILE: &str = "footer.html";
pub const SIGNATURES_FILE: &str = "signatures.html";

/// Where the templates come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// The defaults compiled into the binary
    Embedded,
    /// A directory holding all four template files
    Directory(PathBuf),
}

/// The loaded, immutable template set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateStore {
    body: String,
    header: String,
    footer: String,
    signatures: String,
}

impl TemplateStore {
    /// Builds a store from in-memory markup.
    pub fn new(
        body: impl Into<String>,
        header: impl Into<String>,
        footer: impl Into<String>,
        signatures: impl Into<String>,
    ) -> Self {
        TemplateStore {
            body: body.into(),
            header: header.into(),
            footer: footer.into(),
            signatures: signatures.into(),
        }
    }

    /// Loads the compiled-in default templates.
    pub fn embedded() -> Result<Self, ContractError> {
        Ok(TemplateStore {
            body: embedded_file(BODY_FILE)?,
            header: embedded_file(HEADER_FILE)?,
            footer: embedded_file(FOOTER_FILE)?,
            signatures: embedded_file(SIGNATURES_FILE)?,
        })
    }

    /// Loads all four templates from `dir`.
    ///
    /// # Errors
    /// Returns [`ContractError::IoError`] if any file is missing or unreadable.
    pub fn from_dir(dir: &Path) -> Result<Self, ContractError> {
        debug!("Loading templates from {}", dir.display());
        Ok(TemplateStore {
            body: read_template(&dir.join(BODY_FILE))?,
            header: read_template(&dir.join(HEADER_FILE))?,
            footer: read_template(&dir.join(FOOTER_FILE))?,
            signatures: read_template(&dir.join(SIGNATURES_FILE))?,
        })
    }

    pub fn load(source: &TemplateSource) -> Result<Self, ContractError> {
        match source {
            TemplateSource::Embedded => Self::embedded(),
            TemplateSource::Directory(dir) => Self::from_dir(dir),
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn footer(&self) -> &str {
        &self.footer
    }

    pub fn signatures(&self) -> &str {
        &self.signatures
    }
}

fn embedded_file(name: &str) -> Result<String, ContractError> {
    let file = EmbeddedTemplates::get(name).ok_or_else(|| ContractError::IoError {
        message: format!("Embedded template '{}' is missing", name),
        path: name.to_string(),
        suggestion: "Rebuild the binary with the templates/ directory present".to_string(),
    })?;
    String::from_utf8(file.data.into_owned()).map_err(|e| ContractError::IoError {
        message: format!("Embedded template is not valid UTF-8: {}", e),
        path: name.to_string(),
        suggestion: "Save the template with UTF-8 encoding".to_string(),
    })
}

fn read_template(path: &Path) -> Result<String, ContractError> {
    fs::read_to_string(path).map_err(|e| ContractError::IoError {
        message: format!("Failed to read template: {}", e),
        path: path.display().to_string(),
        suggestion: format!(
            "A template directory must contain {}, {}, {} and {}",
            BODY_FILE, HEADER_FILE, FOOTER_FILE, SIGNATURES_FILE
        ),
    })
}
