//! Configuration loading for contract generation.
//!
//! The configuration is a TOML file. Every key is optional; anything missing
//! keeps its built-in default, so an empty file behaves like no file at all.
//!
//! # Configuration Structure
//!
//! - `[access]` holds the shared `password` that unlocks generation
//! - `[templates]` may point `dir` at a directory with `template.html`,
//!   `header.html`, `footer.html` and `signatures.html`
//! - `[assets]` names the `signature` and `stamp` image files
//! - `[renderer]` selects the `program`, optional `leading_args` (for example
//!   `["-a", "wkhtmltopdf"]` with `program = "xvfb-run"`) and the page options
//! - `[stamp]` and `[signature]` position the images relative to the `anchor`
//! - `[output]` sets the `filename_prefix`
//! - `[[clause]]` entries replace the built-in clause catalog
//!
//! Relative paths in a configuration file are resolved against the directory
//! that contains the file.
//!
//! # Configuration Example
//!
//! ```toml
//! [access]
//! password = "change-me"
//!
//! [assets]
//! signature = "unterschrift.png"
//! stamp = "stempel.png"
//!
//! [stamp]
//! anchor = "Unterschrift"
//! x = 30.0
//! width = 170.0
//! height = 170.0
//!
//! [[clause]]
//! label = "Nachbesetzung"
//! text = "Falls der vermittelte Kandidat ..."
//! ```
//!
//! `contract2pdf --get-default-configuration` prints a complete file with all
//! defaults.
//!
//! The expected password is only ever read from `[access] password`. Callers
//! may supply their *candidate* through the `CONTRACT2PDF_PASSWORD`
//! environment variable instead of the command line.

use crate::access::PasswordGate;
use crate::clauses::ClauseCatalog;
use crate::compositor::{Placement, StampLayout};
use crate::renderer::{RenderOptions, WkHtmlToPdf, DEFAULT_PROGRAM};
use crate::request::DEFAULT_FILENAME_PREFIX;
use crate::templates::TemplateSource;
use crate::ContractError;
use log::{debug, warn};
use once_cell::sync::Lazy;
use std::fs;
use std::path::{Path, PathBuf};
use toml::Value;

/// Name of the configuration file looked up in the working directory and in
/// the user configuration directory.
pub const CONFIG_FILE_NAME: &str = "contract2pdfrc.toml";

/// Environment variable holding the caller's password candidate.
pub const PASSWORD_ENV: &str = "CONTRACT2PDF_PASSWORD";

pub const DEFAULT_SIGNATURE_PATH: &str = "unterschrift.png";
pub const DEFAULT_STAMP_PATH: &str = "stempel.png";

/// Configuration source.
/// Determines where the TOML configuration should be loaded from.
#[derive(Debug, Clone)]
pub enum ConfigSource<'a> {
    /// Use the built-in defaults
    Default,
    /// Load configuration from a file path
    File(&'a str),
    /// Use a TOML string, for example one embedded with `include_str!`
    Embedded(&'a str),
}

/// Renderer program and its options.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub program: String,
    pub leading_args: Vec<String>,
    pub options: RenderOptions,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            program: DEFAULT_PROGRAM.to_string(),
            leading_args: Vec::new(),
            options: RenderOptions::default(),
        }
    }
}

impl RendererConfig {
    pub fn build(&self) -> WkHtmlToPdf {
        WkHtmlToPdf::new(self.program.clone())
            .with_leading_args(self.leading_args.clone())
            .with_options(self.options.clone())
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Shared password; `None` leaves generation locked
    pub password: Option<String>,
    pub templates: TemplateSource,
    pub signature_path: PathBuf,
    pub stamp_path: PathBuf,
    pub renderer: RendererConfig,
    pub layout: StampLayout,
    pub filename_prefix: String,
    pub clauses: ClauseCatalog,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            password: None,
            templates: TemplateSource::Embedded,
            signature_path: PathBuf::from(DEFAULT_SIGNATURE_PATH),
            stamp_path: PathBuf::from(DEFAULT_STAMP_PATH),
            renderer: RendererConfig::default(),
            layout: StampLayout::default(),
            filename_prefix: DEFAULT_FILENAME_PREFIX.to_string(),
            clauses: ClauseCatalog::default(),
        }
    }
}

impl Config {
    /// Builds the password gate.
    ///
    /// # Errors
    /// Returns [`ContractError::ConfigError`] when no password is configured.
    pub fn password_gate(&self) -> Result<PasswordGate, ContractError> {
        PasswordGate::new(self.password.clone().unwrap_or_default())
    }

    /// Makes relative asset and template paths relative to `base`.
    pub fn rebase(mut self, base: &Path) -> Self {
        self.signature_path = rebase_path(base, &self.signature_path);
        self.stamp_path = rebase_path(base, &self.stamp_path);
        if let TemplateSource::Directory(dir) = &self.templates {
            self.templates = TemplateSource::Directory(rebase_path(base, dir));
        }
        self
    }
}

fn rebase_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn get_str<'v>(section: Option<&'v Value>, key: &str) -> Option<&'v str> {
    section.and_then(|s| s.get(key)).and_then(|v| v.as_str())
}

fn get_bool(section: Option<&Value>, key: &str) -> Option<bool> {
    section.and_then(|s| s.get(key)).and_then(|v| v.as_bool())
}

/// Reads a number written either as integer or as float.
fn get_number(section: Option<&Value>, key: &str) -> Option<f32> {
    section.and_then(|s| s.get(key)).and_then(|v| {
        v.as_float()
            .map(|f| f as f32)
            .or_else(|| v.as_integer().map(|i| i as f32))
    })
}

fn get_u32(section: Option<&Value>, key: &str) -> Option<u32> {
    section
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_integer())
        .and_then(|i| u32::try_from(i).ok())
}

/// Parses a `[stamp]` or `[signature]` placement, keeping defaults for
/// missing keys.
fn parse_placement(section: Option<&Value>, default: Placement) -> Placement {
    Placement {
        x: get_number(section, "x").unwrap_or(default.x),
        width: get_number(section, "width").unwrap_or(default.width),
        height: get_number(section, "height").unwrap_or(default.height),
    }
}

fn parse_render_options(section: Option<&Value>, default: RenderOptions) -> RenderOptions {
    RenderOptions {
        no_images: get_bool(section, "no_images").unwrap_or(default.no_images),
        disable_javascript: get_bool(section, "disable_javascript")
            .unwrap_or(default.disable_javascript),
        enable_local_file_access: get_bool(section, "enable_local_file_access")
            .unwrap_or(default.enable_local_file_access),
        quiet: get_bool(section, "quiet").unwrap_or(default.quiet),
        margin_top: get_str(section, "margin_top")
            .map(str::to_string)
            .unwrap_or(default.margin_top),
        margin_bottom: get_str(section, "margin_bottom")
            .map(str::to_string)
            .unwrap_or(default.margin_bottom),
        footer_right: get_str(section, "footer_right")
            .map(str::to_string)
            .unwrap_or(default.footer_right),
        footer_font_size: get_u32(section, "footer_font_size").unwrap_or(default.footer_font_size),
        footer_spacing: get_u32(section, "footer_spacing").unwrap_or(default.footer_spacing),
    }
}

/// Parses `[[clause]]` entries. Entries without both `label` and `text` are
/// skipped. Returns `None` when the file defines no clauses.
fn parse_clauses(value: Option<&Value>) -> Option<ClauseCatalog> {
    let entries: Vec<(String, String)> = value?
        .as_array()?
        .iter()
        .filter_map(|entry| {
            let label = entry.get("label")?.as_str()?;
            let text = entry.get("text")?.as_str()?;
            Some((label.to_string(), text.to_string()))
        })
        .collect();
    if entries.is_empty() {
        None
    } else {
        Some(ClauseCatalog::from_entries(entries))
    }
}

/// Parses a TOML configuration string.
///
/// Unknown keys are ignored and missing keys keep their defaults. A string
/// that is not valid TOML yields the default configuration.
///
/// # Examples
/// ```rust
/// use contract2pdf::config::parse_config_string;
///
/// let config = parse_config_string(r#"
/// [stamp]
/// anchor = "Signature"
/// width = 120
///
/// [output]
/// filename_prefix = "Contract_"
/// "#);
/// assert_eq!(config.layout.anchor, "Signature");
/// assert_eq!(config.layout.stamp.width, 120.0);
/// assert_eq!(config.layout.stamp.height, 170.0);
/// assert_eq!(config.filename_prefix, "Contract_");
/// ```
pub fn parse_config_string(config_str: &str) -> Config {
    let config: Value = match toml::from_str(config_str) {
        Ok(v) => v,
        Err(e) => {
            warn!("Invalid configuration, using defaults: {}", e);
            return Config::default();
        }
    };

    let default = Config::default();
    let access = config.get("access");
    let templates = config.get("templates");
    let assets = config.get("assets");
    let renderer = config.get("renderer");
    let stamp = config.get("stamp");
    let signature = config.get("signature");
    let output = config.get("output");

    let leading_args = renderer
        .and_then(|r| r.get("leading_args"))
        .and_then(|v| v.as_array())
        .map(|args| {
            args.iter()
                .filter_map(|a| a.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or(default.renderer.leading_args);

    Config {
        password: get_str(access, "password")
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        templates: get_str(templates, "dir")
            .map(|dir| TemplateSource::Directory(PathBuf::from(dir)))
            .unwrap_or(default.templates),
        signature_path: get_str(assets, "signature")
            .map(PathBuf::from)
            .unwrap_or(default.signature_path),
        stamp_path: get_str(assets, "stamp")
            .map(PathBuf::from)
            .unwrap_or(default.stamp_path),
        renderer: RendererConfig {
            program: get_str(renderer, "program")
                .map(str::to_string)
                .unwrap_or(default.renderer.program),
            leading_args,
            options: parse_render_options(renderer, default.renderer.options),
        },
        layout: StampLayout {
            anchor: get_str(stamp, "anchor")
                .map(str::to_string)
                .unwrap_or(default.layout.anchor),
            stamp: parse_placement(stamp, default.layout.stamp),
            signature: parse_placement(signature, default.layout.signature),
            clearance: get_number(stamp, "clearance").unwrap_or(default.layout.clearance),
            require_anchor: get_bool(stamp, "require_anchor")
                .unwrap_or(default.layout.require_anchor),
        },
        filename_prefix: get_str(output, "filename_prefix")
            .map(str::to_string)
            .unwrap_or(default.filename_prefix),
        clauses: parse_clauses(config.get("clause")).unwrap_or(default.clauses),
    }
}

/// Loads the configuration from `source`.
///
/// # Errors
/// Returns [`ContractError::ConfigError`] when a configuration file was named
/// but cannot be read. Invalid TOML is not an error; see
/// [`parse_config_string`].
pub fn load_config_from_source(source: ConfigSource) -> Result<Config, ContractError> {
    match source {
        ConfigSource::Default => Ok(Config::default()),
        ConfigSource::File(path) => {
            let config_path = Path::new(path);
            let config_str =
                fs::read_to_string(config_path).map_err(|e| ContractError::ConfigError {
                    message: format!("Failed to read configuration file {}: {}", path, e),
                    suggestion: "Check the --config path or run with --get-default-configuration to create one".to_string(),
                })?;
            debug!("Loaded configuration from {}", config_path.display());
            let base = config_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            Ok(parse_config_string(&config_str).rebase(base))
        }
        ConfigSource::Embedded(content) => Ok(parse_config_string(content)),
    }
}

/// Location of the configuration file in the user's configuration directory,
/// e.g. `~/.config/contract2pdf/contract2pdfrc.toml`.
/// Returns the password candidate offered by the caller: `explicit` when it
/// is set and not empty, otherwise [`PASSWORD_ENV`].
pub fn password_candidate(explicit: Option<&str>) -> Option<String> {
    pick_candidate(explicit, std::env::var(PASSWORD_ENV).ok())
}

fn pick_candidate(explicit: Option<&str>, from_env: Option<String>) -> Option<String> {
    explicit
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .or(from_env.filter(|p| !p.is_empty()))
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("contract2pdf").join(CONFIG_FILE_NAME))
}

static DEFAULT_CONFIG_TOML: Lazy<String> = Lazy::new(build_default_config_toml);

/// A complete configuration file spelling out every default.
pub fn default_config_toml() -> &'static str {
    &DEFAULT_CONFIG_TOML
}

fn toml_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn build_default_config_toml() -> String {
    let config = Config::default();
    let options = &config.renderer.options;
    let layout = &config.layout;
    let mut out = String::new();

    out.push_str("# contract2pdf configuration\n\n");
    out.push_str("[access]\n");
    out.push_str("# Shared password required to generate contracts.\n");
    out.push_str(&format!(
        "# Callers pass their password with --password or {}.\n",
        PASSWORD_ENV
    ));
    out.push_str("# password = \"change-me\"\n\n");

    out.push_str("[templates]\n");
    out.push_str("# Directory with template.html, header.html, footer.html and signatures.html.\n");
    out.push_str("# The built-in templates are used when unset.\n");
    out.push_str("# dir = \"templates\"\n\n");

    out.push_str("[assets]\n");
    out.push_str(&format!("signature = {}\n", toml_string(DEFAULT_SIGNATURE_PATH)));
    out.push_str(&format!("stamp = {}\n\n", toml_string(DEFAULT_STAMP_PATH)));

    out.push_str("[renderer]\n");
    out.push_str(&format!("program = {}\n", toml_string(&config.renderer.program)));
    out.push_str("leading_args = []\n");
    out.push_str(&format!("no_images = {}\n", options.no_images));
    out.push_str(&format!("disable_javascript = {}\n", options.disable_javascript));
    out.push_str(&format!(
        "enable_local_file_access = {}\n",
        options.enable_local_file_access
    ));
    out.push_str(&format!("quiet = {}\n", options.quiet));
    out.push_str(&format!("margin_top = {}\n", toml_string(&options.margin_top)));
    out.push_str(&format!("margin_bottom = {}\n", toml_string(&options.margin_bottom)));
    out.push_str(&format!("footer_right = {}\n", toml_string(&options.footer_right)));
    out.push_str(&format!("footer_font_size = {}\n", options.footer_font_size));
    out.push_str(&format!("footer_spacing = {}\n\n", options.footer_spacing));

    out.push_str("[stamp]\n");
    out.push_str("# Text on the last page the images are positioned against.\n");
    out.push_str(&format!("anchor = {}\n", toml_string(&layout.anchor)));
    out.push_str("# Fail instead of leaving the page unsigned when the anchor is missing.\n");
    out.push_str(&format!("require_anchor = {}\n", layout.require_anchor));
    out.push_str(&format!("clearance = {:.1}\n", layout.clearance));
    out.push_str(&format!("x = {:.1}\n", layout.stamp.x));
    out.push_str(&format!("width = {:.1}\n", layout.stamp.width));
    out.push_str(&format!("height = {:.1}\n\n", layout.stamp.height));

    out.push_str("[signature]\n");
    out.push_str(&format!("x = {:.1}\n", layout.signature.x));
    out.push_str(&format!("width = {:.1}\n", layout.signature.width));
    out.push_str(&format!("height = {:.1}\n\n", layout.signature.height));

    out.push_str("[output]\n");
    out.push_str(&format!(
        "filename_prefix = {}\n",
        toml_string(&config.filename_prefix)
    ));

    for label in config.clauses.labels() {
        let text = config.clauses.get(label).unwrap_or_default();
        out.push_str("\n[[clause]]\n");
        out.push_str(&format!("label = {}\n", toml_string(label)));
        out.push_str(&format!("text = {}\n", toml_string(text)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_placement() {
        let value: Value = toml::from_str(
            r#"
            x = 12
            height = 40.5
        "#,
        )
        .unwrap();
        let default = Placement {
            x: 1.0,
            width: 2.0,
            height: 3.0,
        };
        let placement = parse_placement(Some(&value), default);
        assert_eq!(placement.x, 12.0);
        assert_eq!(placement.width, 2.0);
        assert_eq!(placement.height, 40.5);

        assert_eq!(parse_placement(None, default), default);
    }

    #[test]
    fn test_parse_config_string() {
        let config_str = r#"
            [access]
            password = "geheim"

            [templates]
            dir = "/srv/templates"

            [assets]
            signature = "/srv/sig.png"

            [renderer]
            program = "xvfb-run"
            leading_args = ["-a", "wkhtmltopdf"]
            margin_top = "30mm"
            footer_font_size = 8
            no_images = false

            [stamp]
            anchor = "Signature"
            require_anchor = true
            clearance = 10
            x = 50.0

            [signature]
            width = 300

            [output]
            filename_prefix = "Vertrag_"
        "#;

        let config = parse_config_string(config_str);

        assert_eq!(config.password.as_deref(), Some("geheim"));
        assert_eq!(
            config.templates,
            TemplateSource::Directory(PathBuf::from("/srv/templates"))
        );
        assert_eq!(config.signature_path, PathBuf::from("/srv/sig.png"));
        assert_eq!(config.stamp_path, PathBuf::from(DEFAULT_STAMP_PATH));
        assert_eq!(config.renderer.program, "xvfb-run");
        assert_eq!(config.renderer.leading_args, vec!["-a", "wkhtmltopdf"]);
        assert_eq!(config.renderer.options.margin_top, "30mm");
        assert_eq!(config.renderer.options.margin_bottom, "40mm");
        assert_eq!(config.renderer.options.footer_font_size, 8);
        assert!(!config.renderer.options.no_images);
        assert!(config.renderer.options.quiet);
        assert_eq!(config.layout.anchor, "Signature");
        assert!(config.layout.require_anchor);
        assert_eq!(config.layout.clearance, 10.0);
        assert_eq!(config.layout.stamp.x, 50.0);
        assert_eq!(config.layout.stamp.width, 170.0);
        assert_eq!(config.layout.signature.width, 300.0);
        assert_eq!(config.layout.signature.x, -20.0);
        assert_eq!(config.filename_prefix, "Vertrag_");
        assert_eq!(config.clauses, ClauseCatalog::default());
    }

    #[test]
    fn test_parse_clauses_replace_catalog() {
        let config = parse_config_string(
            r#"
            [[clause]]
            label = "Eins"
            text = "Erste Klausel"

            [[clause]]
            label = "Kaputt"

            [[clause]]
            label = "Zwei"
            text = "Zweite Klausel"
        "#,
        );
        let labels: Vec<&str> = config.clauses.labels().collect();
        assert_eq!(labels, vec!["Eins", "Zwei"]);
        assert_eq!(config.clauses.get("Zwei"), Some("Zweite Klausel"));
    }

    #[test]
    fn test_empty_password_is_unset() {
        let config = parse_config_string("[access]\npassword = \"\"\n");
        assert_eq!(config.password, None);
    }

    #[test]
    fn test_parse_config_string_invalid_toml() {
        let config = parse_config_string("this is not valid toml {{{");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_password_candidate_prefers_explicit_value() {
        assert_eq!(
            pick_candidate(Some("cli"), Some("env".to_string())).as_deref(),
            Some("cli")
        );
        assert_eq!(
            pick_candidate(Some(""), Some("env".to_string())).as_deref(),
            Some("env")
        );
        assert_eq!(pick_candidate(None, Some(String::new())), None);
        assert_eq!(pick_candidate(None, None), None);
    }

    #[test]
    fn test_password_gate_requires_password() {
        assert!(matches!(
            Config::default().password_gate(),
            Err(ContractError::ConfigError { .. })
        ));
        let gate = parse_config_string("[access]\npassword = \"geheim\"\n")
            .password_gate()
            .unwrap();
        assert!(gate.check("geheim").is_ok());
    }

    #[test]
    fn test_renderer_config_build() {
        let config = parse_config_string(
            "[renderer]\nprogram = \"xvfb-run\"\nmargin_top = \"10mm\"\n",
        );
        let renderer = config.renderer.build();
        assert_eq!(renderer.options().margin_top, "10mm");
    }

    #[test]
    fn test_default_config_toml_round_trips_to_defaults() {
        let text = default_config_toml();
        assert!(text.contains("[[clause]]"));
        assert!(text.contains("anchor = \"Unterschrift\""));
        assert_eq!(parse_config_string(text), Config::default());
    }

    #[test]
    fn test_config_source_default() {
        let config = load_config_from_source(ConfigSource::Default).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_source_embedded() {
        const EMBEDDED_CONFIG: &str = r#"
            [output]
            filename_prefix = "Embedded_"
        "#;
        let config = load_config_from_source(ConfigSource::Embedded(EMBEDDED_CONFIG)).unwrap();
        assert_eq!(config.filename_prefix, "Embedded_");
        // Embedded sources have no directory to resolve against.
        assert_eq!(config.signature_path, PathBuf::from(DEFAULT_SIGNATURE_PATH));
    }

    #[test]
    fn test_config_source_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[templates]\ndir = \"tpl\"\n[assets]\nstamp = \"/abs/stempel.png\"\n"
        )
        .unwrap();

        let config = load_config_from_source(ConfigSource::File(path.to_str().unwrap())).unwrap();
        assert_eq!(
            config.templates,
            TemplateSource::Directory(dir.path().join("tpl"))
        );
        assert_eq!(config.signature_path, dir.path().join(DEFAULT_SIGNATURE_PATH));
        assert_eq!(config.stamp_path, PathBuf::from("/abs/stempel.png"));
    }

    #[test]
    fn test_config_source_file_nonexistent() {
        let result = load_config_from_source(ConfigSource::File("nonexistent.toml"));
        assert!(matches!(result, Err(ContractError::ConfigError { .. })));
    }

    #[test]
    fn test_user_config_path_file_name() {
        if let Some(path) = user_config_path() {
            assert!(path.ends_with("contract2pdf/contract2pdfrc.toml"));
        }
    }
}
