//! The contract2pdf library turns a handful of contract parameters into a
//! finished, signed framework agreement ("Rahmenvereinbarung") as PDF.
//!
//! The pipeline substitutes the request into an HTML contract template, hands
//! the markup to an external HTML-to-PDF renderer and finally draws the
//! signature and the company stamp next to the signature line on the last
//! page. Generation is gated by a shared password.
//!
//! ```rust,no_run
//! use contract2pdf::config::{load_config_from_source, ConfigSource};
//! use contract2pdf::request::ContractRequest;
//! use contract2pdf::ContractKit;
//! use std::error::Error;
//! use std::path::Path;
//!
//! fn example() -> Result<(), Box<dyn Error>> {
//!     let config = load_config_from_source(ConfigSource::File("contract2pdfrc.toml"))?;
//!     let gate = config.password_gate()?;
//!     let authorized = gate.check("the shared password")?;
//!
//!     let kit = ContractKit::from_config(&config)?;
//!     let renderer = config.renderer.build();
//!     let request = ContractRequest::new("Acme GmbH", "Hauptstraße 1, Berlin", "25", "01.02.2025")
//!         .with_clauses(["Nachbesetzung"]);
//!
//!     let path = contract2pdf::generate_into_file(&authorized, request, &kit, &renderer, Path::new("."))?;
//!     println!("Wrote {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Processing Flow
//! ```text
//! +--------------+     +------------------+     +-----------------+
//! | Request      |     | Substitution     |     | Renderer        |
//! | - company    | --> | - template.html  | --> | (wkhtmltopdf)   |
//! | - clauses    |     | - signatures     |     | -> raw PDF      |
//! +--------------+     +------------------+     +-----------------+
//!                                                        |
//!                      +------------------+              v
//!                      | Final PDF        |     +-----------------+
//!                      | Rahmenverein-    | <-- | Compositor      |
//!                      | barung_<Co>.pdf  |     | stamp+signature |
//!                      +------------------+     +-----------------+
//! ```

pub mod access;
pub mod clauses;
pub mod compositor;
pub mod config;
pub mod images;
pub mod renderer;
pub mod request;
pub mod substitution;
pub mod templates;
pub mod text;
pub mod validation;

use access::Authorized;
use clauses::ClauseCatalog;
use compositor::{stamp_last_page, StampLayout};
use images::ImageAsset;
use log::{debug, info};
use renderer::{RenderError as RendererFailure, RenderJob, Renderer};
use request::ContractRequest;
use std::error::Error;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use templates::TemplateStore;

/// MIME type of the generated document.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Errors that can occur while generating a contract.
#[derive(Debug)]
pub enum ContractError {
    /// Reading templates or writing the output failed
    IoError {
        message: String,
        path: String,
        suggestion: String,
    },
    /// The external renderer failed
    RenderError { message: String, suggestion: String },
    /// The rendered PDF could not be read, stamped or saved
    DocumentError { message: String, suggestion: String },
    /// Indicates an invalid or incomplete configuration
    ConfigError { message: String, suggestion: String },
    /// The password did not match
    AccessDenied,
    /// A selected clause is not in the catalog
    UnknownClause { label: String },
    /// A signature or stamp image could not be loaded
    ImageError { message: String, path: String },
}

impl Error for ContractError {}
impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ContractError::IoError {
                message,
                path,
                suggestion,
            } => {
                write!(f, "❌ File Error: {}", message)?;
                write!(f, "\n📁 Path: {}", path)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            ContractError::RenderError {
                message,
                suggestion,
            } => {
                write!(f, "❌ Rendering Error: {}", message)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            ContractError::DocumentError {
                message,
                suggestion,
            } => {
                write!(f, "❌ PDF Error: {}", message)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            ContractError::ConfigError {
                message,
                suggestion,
            } => {
                write!(f, "❌ Configuration Error: {}", message)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            ContractError::AccessDenied => {
                write!(f, "❌ Access Denied: Wrong password")
            }
            ContractError::UnknownClause { label } => {
                write!(f, "❌ Unknown Clause: '{}'", label)?;
                write!(
                    f,
                    "\n💡 Suggestion: Run with --list-clauses to see the available clauses"
                )?;
                Ok(())
            }
            ContractError::ImageError { message, path } => {
                write!(f, "❌ Image Error: {}", message)?;
                write!(f, "\n📁 Path: {}", path)?;
                Ok(())
            }
        }
    }
}

impl ContractError {
    /// Wraps an image loading failure for the asset at `path`.
    pub fn image_error(err: images::ImageError, path: &Path) -> Self {
        ContractError::ImageError {
            message: err.to_string(),
            path: path.display().to_string(),
        }
    }
}

impl From<RendererFailure> for ContractError {
    fn from(err: RendererFailure) -> Self {
        let suggestion = match &err {
            RendererFailure::Launch { program, .. } => format!(
                "Install {} or set [renderer] program in the configuration",
                program
            ),
            RendererFailure::Failed { .. } => {
                "Check the renderer output above; on headless servers try program = \"xvfb-run\" with leading_args = [\"-a\", \"wkhtmltopdf\"]".to_string()
            }
            RendererFailure::Io(_) => {
                "Check that the temporary directory is writable and has free space".to_string()
            }
            RendererFailure::InvalidOutput(_) => {
                "Check that the configured program is an HTML to PDF converter".to_string()
            }
        };
        ContractError::RenderError {
            message: err.to_string(),
            suggestion,
        }
    }
}

/// Everything needed to generate contracts, loaded once and shared between
/// requests.
#[derive(Debug, Clone)]
pub struct ContractKit {
    pub templates: TemplateStore,
    pub catalog: ClauseCatalog,
    pub layout: StampLayout,
    pub stamp: ImageAsset,
    pub signature: ImageAsset,
    pub filename_prefix: String,
}

impl ContractKit {
    /// Loads templates and image assets named by `config`.
    ///
    /// # Errors
    /// Fails when a template or image file is missing or unreadable.
    pub fn from_config(config: &config::Config) -> Result<Self, ContractError> {
        let templates = TemplateStore::load(&config.templates)?;
        let stamp = ImageAsset::load(&config.stamp_path)
            .map_err(|e| ContractError::image_error(e, &config.stamp_path))?;
        let signature = ImageAsset::load(&config.signature_path)
            .map_err(|e| ContractError::image_error(e, &config.signature_path))?;
        Ok(ContractKit {
            templates,
            catalog: config.clauses.clone(),
            layout: config.layout.clone(),
            stamp,
            signature,
            filename_prefix: config.filename_prefix.clone(),
        })
    }
}

/// A finished contract.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContract {
    /// Suggested file name, e.g. `Rahmenvereinbarung_Acme GmbH.pdf`
    pub filename: String,
    pub bytes: Vec<u8>,
    /// `false` when the anchor was missing and no images were placed
    pub stamped: bool,
}

impl GeneratedContract {
    pub fn mime_type(&self) -> &'static str {
        PDF_MIME_TYPE
    }
}

/// Substitutes `request` into the templates.
///
/// The signature block is appended to the body after substitution, and the
/// header and footer go through the same rules.
///
/// # Errors
/// Returns [`ContractError::UnknownClause`] for a selected clause that is not
/// in `catalog`.
pub fn compose_html(
    templates: &TemplateStore,
    request: &ContractRequest,
    catalog: &ClauseCatalog,
) -> Result<RenderJob, ContractError> {
    let rules = request.rules(catalog)?;
    let mut body = rules.apply(templates.body());
    body.push_str(&rules.apply(templates.signatures()));
    debug!(
        "Composed {} bytes of markup with {} clause(s)",
        body.len(),
        request.selected_clauses.len()
    );
    Ok(RenderJob {
        body,
        header: rules.apply(templates.header()),
        footer: rules.apply(templates.footer()),
    })
}

/// Generates a contract and returns it in memory.
///
/// The request is consumed; nothing of it outlives the call apart from the
/// returned document.
///
/// # Errors
/// * [`ContractError::UnknownClause`] before anything is rendered
/// * [`ContractError::RenderError`] when the renderer fails
/// * [`ContractError::DocumentError`] when stamping fails
pub fn generate_into_bytes(
    authorized: &Authorized,
    request: ContractRequest,
    kit: &ContractKit,
    renderer: &dyn Renderer,
) -> Result<GeneratedContract, ContractError> {
    let job = compose_html(&kit.templates, &request, &kit.catalog)?;
    render_composed(
        authorized,
        &job,
        request.output_filename(&kit.filename_prefix),
        kit,
        renderer,
    )
}

/// Renders already composed markup and stamps the result.
///
/// # Errors
/// * [`ContractError::RenderError`] when the renderer fails
/// * [`ContractError::DocumentError`] when stamping fails
pub fn render_composed(
    _authorized: &Authorized,
    job: &RenderJob,
    filename: String,
    kit: &ContractKit,
    renderer: &dyn Renderer,
) -> Result<GeneratedContract, ContractError> {
    let rendered = renderer.render(job)?;
    debug!("Renderer returned {} bytes", rendered.len());

    let outcome = stamp_last_page(&rendered, &kit.layout, &kit.stamp, &kit.signature)?;
    let stamped = outcome.is_stamped();
    let contract = GeneratedContract {
        filename,
        bytes: outcome.into_bytes(),
        stamped,
    };
    info!(
        "Generated {} ({} bytes, stamped: {})",
        contract.filename,
        contract.bytes.len(),
        contract.stamped
    );
    Ok(contract)
}

/// Fails with [`ContractError::IoError`] unless `dir` is an existing directory.
pub fn ensure_output_dir(dir: &Path) -> Result<(), ContractError> {
    if dir.is_dir() {
        return Ok(());
    }
    Err(ContractError::IoError {
        message: "Output directory does not exist".to_string(),
        path: dir.display().to_string(),
        suggestion: format!("Create the directory first: mkdir -p {}", dir.display()),
    })
}

/// Writes `contract` into `dir` under its suggested file name and returns the
/// written path.
///
/// The bytes go to a temporary file in `dir` first, which is then renamed, so
/// a failed write never leaves a truncated contract behind.
///
/// # Errors
/// Returns [`ContractError::IoError`] when `dir` does not exist or the file
/// cannot be written.
pub fn write_contract(contract: &GeneratedContract, dir: &Path) -> Result<PathBuf, ContractError> {
    ensure_output_dir(dir)?;
    let path = dir.join(&contract.filename);
    let write_error = |e: std::io::Error| ContractError::IoError {
        message: format!("Failed to write contract: {}", e),
        path: path.display().to_string(),
        suggestion: "Check that you have write permissions for this location".to_string(),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
    file.write_all(&contract.bytes).map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;
    file.persist(&path).map_err(|e| write_error(e.error))?;
    debug!("Wrote {}", path.display());
    Ok(path)
}

/// Generates a contract and writes it into `dir` under its suggested file
/// name. Returns the written path.
///
/// # Errors
/// Besides the errors of [`generate_into_bytes`], returns
/// [`ContractError::IoError`] when `dir` does not exist or the file cannot be
/// written. The directory is checked before rendering.
pub fn generate_into_file(
    authorized: &Authorized,
    request: ContractRequest,
    kit: &ContractKit,
    renderer: &dyn Renderer,
    dir: &Path,
) -> Result<PathBuf, ContractError> {
    ensure_output_dir(dir)?;
    let contract = generate_into_bytes(authorized, request, kit, renderer)?;
    write_contract(&contract, dir)
}
