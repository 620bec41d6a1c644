//! HTML to PDF rendering.
//!
//! Rendering is delegated to an external program behind the [`Renderer`]
//! trait. [`WkHtmlToPdf`] drives the `wkhtmltopdf` command line tool: the body,
//! header and footer markup are written into a temporary directory, the tool
//! is run to completion and the produced PDF is read back into memory.
//!
//! The temporary directory belongs to a single [`Renderer::render`] call and
//! is removed when the call returns, whether it succeeded or not.
//!
//! There is no timeout. A renderer that hangs blocks the caller.

use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Default program name looked up on `PATH`.
pub const DEFAULT_PROGRAM: &str = "wkhtmltopdf";

/// Options passed to the renderer on every run.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Do not load embedded raster images in the body
    pub no_images: bool,
    pub disable_javascript: bool,
    /// Allow the markup to reference files on the local disk
    pub enable_local_file_access: bool,
    pub quiet: bool,
    pub margin_top: String,
    pub margin_bottom: String,
    /// Content of the footer's right slot; `[page]` prints the page number
    pub footer_right: String,
    pub footer_font_size: u32,
    pub footer_spacing: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            no_images: true,
            disable_javascript: true,
            enable_local_file_access: true,
            quiet: true,
            margin_top: "40mm".to_string(),
            margin_bottom: "40mm".to_string(),
            footer_right: "[page]".to_string(),
            footer_font_size: 10,
            footer_spacing: 5,
        }
    }
}

impl RenderOptions {
    /// Builds the option arguments for a run with the given header and footer
    /// files.
    pub fn to_args(&self, header: &Path, footer: &Path) -> Vec<String> {
        let mut args = Vec::new();
        if self.no_images {
            args.push("--no-images".to_string());
        }
        if self.disable_javascript {
            args.push("--disable-javascript".to_string());
        }
        if self.enable_local_file_access {
            args.push("--enable-local-file-access".to_string());
        }
        if self.quiet {
            args.push("--quiet".to_string());
        }
        args.push("--header-html".to_string());
        args.push(header.display().to_string());
        args.push("--footer-html".to_string());
        args.push(footer.display().to_string());
        args.push("--margin-top".to_string());
        args.push(self.margin_top.clone());
        args.push("--margin-bottom".to_string());
        args.push(self.margin_bottom.clone());
        args.push("--footer-right".to_string());
        args.push(self.footer_right.clone());
        args.push("--footer-font-size".to_string());
        args.push(self.footer_font_size.to_string());
        args.push("--footer-spacing".to_string());
        args.push(self.footer_spacing.to_string());
        args
    }
}

/// A complete document to render: body markup plus the header and footer
/// fragments repeated on each page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub body: String,
    pub header: String,
    pub footer: String,
}

/// Error types for rendering.
#[derive(Debug)]
pub enum RenderError {
    /// Temporary files could not be created, written or read back
    Io(io::Error),
    /// The renderer program could not be started
    Launch { program: String, source: io::Error },
    /// The renderer ran and reported failure
    Failed { status: String, stderr: String },
    /// The renderer succeeded but produced no usable PDF
    InvalidOutput(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Io(e) => write!(f, "Temporary file error: {}", e),
            RenderError::Launch { program, source } => {
                write!(f, "Failed to start '{}': {}", program, source)
            }
            RenderError::Failed { status, stderr } => {
                write!(f, "Renderer exited with {}", status)?;
                if !stderr.trim().is_empty() {
                    write!(f, ": {}", stderr.trim())?;
                }
                Ok(())
            }
            RenderError::InvalidOutput(e) => write!(f, "Renderer produced no valid PDF: {}", e),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<io::Error> for RenderError {
    fn from(e: io::Error) -> Self {
        RenderError::Io(e)
    }
}

/// Turns complete markup into PDF bytes.
pub trait Renderer {
    fn render(&self, job: &RenderJob) -> Result<Vec<u8>, RenderError>;
}

/// Renderer backed by the `wkhtmltopdf` executable.
#[derive(Debug, Clone)]
pub struct WkHtmlToPdf {
    program: String,
    leading_args: Vec<String>,
    options: RenderOptions,
    work_root: Option<PathBuf>,
}

impl Default for WkHtmlToPdf {
    fn default() -> Self {
        WkHtmlToPdf::new(DEFAULT_PROGRAM)
    }
}

impl WkHtmlToPdf {
    pub fn new(program: impl Into<String>) -> Self {
        WkHtmlToPdf {
            program: program.into(),
            leading_args: Vec::new(),
            options: RenderOptions::default(),
            work_root: None,
        }
    }

    /// Arguments placed before the generated options, for wrappers such as
    /// `xvfb-run -a wkhtmltopdf`.
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Directory under which the per-run temporary directory is created.
    /// Defaults to the system temp dir.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    fn work_dir(&self) -> io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("contract2pdf-");
        match &self.work_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}

impl Renderer for WkHtmlToPdf {
    fn render(&self, job: &RenderJob) -> Result<Vec<u8>, RenderError> {
        // Dropped on every return path, which removes all files below it.
        let work = self.work_dir()?;
        let body_path = work.path().join("body.html");
        let header_path = work.path().join("header.html");
        let footer_path = work.path().join("footer.html");
        let output_path = work.path().join("output.pdf");

        fs::write(&body_path, job.body.as_bytes())?;
        fs::write(&header_path, job.header.as_bytes())?;
        fs::write(&footer_path, job.footer.as_bytes())?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(self.options.to_args(&header_path, &footer_path))
            .arg(&body_path)
            .arg(&output_path);
        debug!("Running renderer: {:?}", command);

        let output = command.output().map_err(|e| RenderError::Launch {
            program: self.program.clone(),
            source: e,
        })?;

        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let bytes = fs::read(&output_path).map_err(|e| {
            RenderError::InvalidOutput(format!("cannot read {}: {}", output_path.display(), e))
        })?;
        if !bytes.starts_with(b"%PDF-") {
            return Err(RenderError::InvalidOutput(format!(
                "{} bytes without a PDF header",
                bytes.len()
            )));
        }

        info!("Rendered {} bytes of PDF", bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_match_contract_layout() {
        let args = RenderOptions::default().to_args(Path::new("h.html"), Path::new("f.html"));
        let expected: Vec<String> = [
            "--no-images",
            "--disable-javascript",
            "--enable-local-file-access",
            "--quiet",
            "--header-html",
            "h.html",
            "--footer-html",
            "f.html",
            "--margin-top",
            "40mm",
            "--margin-bottom",
            "40mm",
            "--footer-right",
            "[page]",
            "--footer-font-size",
            "10",
            "--footer-spacing",
            "5",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_disabled_flags_are_omitted() {
        let options = RenderOptions {
            no_images: false,
            quiet: false,
            ..RenderOptions::default()
        };
        let args = options.to_args(Path::new("h"), Path::new("f"));
        assert!(!args.contains(&"--no-images".to_string()));
        assert!(!args.contains(&"--quiet".to_string()));
        assert!(args.contains(&"--disable-javascript".to_string()));
    }

    #[test]
    fn test_missing_program_is_launch_error_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let renderer = WkHtmlToPdf::new("definitely-not-a-real-renderer-xyz")
            .with_work_root(root.path());
        let job = RenderJob {
            body: "<p>x</p>".to_string(),
            header: String::new(),
            footer: String::new(),
        };
        let err = renderer.render(&job).unwrap_err();
        assert!(matches!(err, RenderError::Launch { .. }));
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_render_error_display() {
        let e = RenderError::Failed {
            status: "exit status: 1".to_string(),
            stderr: "boom\n".to_string(),
        };
        assert_eq!(e.to_string(), "Renderer exited with exit status: 1: boom");
        let e = RenderError::InvalidOutput("empty".to_string());
        assert!(e.to_string().contains("empty"));
    }
}
