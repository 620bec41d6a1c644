use clap::{Arg, Command};
use contract2pdf::access::Authorized;
use contract2pdf::config::{self, Config, ConfigSource};
use contract2pdf::request::ContractRequest;
use contract2pdf::templates::TemplateStore;
use contract2pdf::{validation, ContractError, ContractKit};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Debug)]
enum AppError {
    ConfigError(String),
    InputError(String),
    AccessError(String),
    GenerationError(String),
    FileWriteError(std::io::Error),
}

impl From<ContractError> for AppError {
    fn from(e: ContractError) -> Self {
        match e {
            ContractError::AccessDenied => AppError::AccessError(e.to_string()),
            ContractError::ConfigError { .. } => AppError::ConfigError(e.to_string()),
            ContractError::UnknownClause { .. } => AppError::InputError(e.to_string()),
            _ => AppError::GenerationError(e.to_string()),
        }
    }
}

/// Verbosity level for output
#[derive(Debug, Clone, Copy, PartialEq)]
enum Verbosity {
    Quiet,   // No output except errors
    Normal,  // Standard output
    Verbose, // Detailed output
}

impl Verbosity {
    fn from_matches(matches: &clap::ArgMatches) -> Self {
        if matches.get_flag("quiet") {
            Verbosity::Quiet
        } else if matches.get_flag("verbose") {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn default_log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
        }
    }
}

/// Get the configuration file to load.
///
/// Priority order:
/// 1. If `--config` is explicitly provided, use that file
/// 2. If `contract2pdfrc.toml` exists in current directory, use it
/// 3. If it exists in the user configuration directory, use that one
/// 4. Otherwise use default configuration
fn get_config_path(matches: &clap::ArgMatches) -> Option<String> {
    if let Some(config_file) = matches.get_one::<String>("config") {
        return Some(config_file.to_string());
    }

    if Path::new(config::CONFIG_FILE_NAME).exists() {
        return Some(config::CONFIG_FILE_NAME.to_string());
    }

    config::user_config_path()
        .filter(|p| p.exists())
        .map(|p| p.display().to_string())
}

fn load_config(matches: &clap::ArgMatches) -> Result<Config, AppError> {
    let path = get_config_path(matches);
    let source = match &path {
        Some(p) => ConfigSource::File(p),
        None => ConfigSource::Default,
    };
    debug!("Configuration source: {:?}", source);
    Ok(config::load_config_from_source(source)?)
}

fn get_request(matches: &clap::ArgMatches) -> Result<ContractRequest, AppError> {
    let company = matches
        .get_one::<String>("company")
        .ok_or_else(|| AppError::InputError("No company name provided".to_string()))?;
    let text = |id: &str| matches.get_one::<String>(id).cloned().unwrap_or_default();
    let clauses: Vec<String> = matches
        .get_many::<String>("clause")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    Ok(ContractRequest::new(
        company.as_str(),
        text("address"),
        &text("percentage"),
        text("date"),
    )
    .with_clauses(clauses))
}

fn get_output_dir(matches: &clap::ArgMatches) -> Result<PathBuf, AppError> {
    let current_dir =
        std::env::current_dir().map_err(|e| AppError::InputError(e.to_string()))?;

    Ok(matches
        .get_one::<String>("output-dir")
        .map(|p| current_dir.join(p))
        .unwrap_or(current_dir))
}

fn print_clauses(config: &Config, verbosity: Verbosity) {
    for label in config.clauses.labels() {
        println!("{}", label);
        if verbosity == Verbosity::Verbose {
            if let Some(text) = config.clauses.get(label) {
                println!("    {}", text);
            }
        }
    }
}

/// Checks the caller's password candidate (`--password`, else
/// `CONTRACT2PDF_PASSWORD`) against the configured password.
fn authorize(matches: &clap::ArgMatches, config: &Config) -> Result<Authorized, AppError> {
    let gate = config.password_gate()?;
    let candidate = config::password_candidate(
        matches.get_one::<String>("password").map(String::as_str),
    )
    .ok_or_else(|| {
        AppError::AccessError(format!(
            "No password provided (use --password or {})",
            config::PASSWORD_ENV
        ))
    })?;
    Ok(gate.check(&candidate)?)
}

fn run(matches: clap::ArgMatches, config: Config) -> Result<(), AppError> {
    let verbosity = Verbosity::from_matches(&matches);
    let dry_run = matches.get_flag("dry-run");
    let html_path = matches.get_one::<String>("html");

    let request = get_request(&matches)?;
    let output_dir = get_output_dir(&matches)?;

    // Anything that writes contract content needs the password first
    let authorized = if dry_run && html_path.is_none() {
        None
    } else {
        Some(authorize(&matches, &config)?)
    };

    // A dry run reports missing images as warnings instead of failing on them
    let kit = if dry_run {
        None
    } else {
        Some(ContractKit::from_config(&config)?)
    };
    let loaded;
    let templates = match &kit {
        Some(kit) => &kit.templates,
        None => {
            loaded = TemplateStore::load(&config.templates)?;
            &loaded
        }
    };
    let job = contract2pdf::compose_html(templates, &request, &config.clauses)?;

    if let (Some(html_path), Some(_)) = (html_path, &authorized) {
        fs::write(html_path, &job.body).map_err(AppError::FileWriteError)?;
        if verbosity != Verbosity::Quiet {
            println!("✅ Wrote composed markup to {}", html_path);
        }
    }

    let warnings = validation::validate_generation(&job, &request, &config, Some(&output_dir));
    if verbosity != Verbosity::Quiet {
        if !warnings.is_empty() {
            if verbosity == Verbosity::Verbose {
                info!("🔍 Pre-flight validation:");
            }
            for warning in &warnings {
                warn!("{}", warning);
            }
        } else if verbosity == Verbosity::Verbose {
            info!("✓ Pre-flight validation passed");
        }
    }

    let (Some(authorized), Some(kit)) = (authorized, kit) else {
        if verbosity == Verbosity::Quiet {
            return if warnings.is_empty() {
                Ok(())
            } else {
                Err(AppError::InputError(format!(
                    "{} validation warnings",
                    warnings.len()
                )))
            };
        }
        println!("✓ Dry-run validation complete. No PDF generated.");
        if warnings.is_empty() {
            println!("✓ No issues detected. Run without --dry-run to generate the contract.");
        } else {
            println!("⚠️  {} warning(s) found:", warnings.len());
            for warning in &warnings {
                println!("  • {}", warning);
            }
        }
        return Ok(());
    };

    contract2pdf::ensure_output_dir(&output_dir)?;
    let renderer = config.renderer.build();
    if verbosity == Verbosity::Verbose {
        info!("📄 Rendering with {}", config.renderer.program);
    }

    let filename = request.output_filename(&kit.filename_prefix);
    let contract = contract2pdf::render_composed(&authorized, &job, filename, &kit, &renderer)?;
    let path = contract2pdf::write_contract(&contract, &output_dir)?;

    if verbosity != Verbosity::Quiet {
        println!("✅ Successfully saved contract to {}", path.display());

        if verbosity == Verbosity::Verbose {
            let size_kb = contract.bytes.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.2} MB", size_kb / 1024.0);
            }
        }
    }

    Ok(())
}

fn build_cli() -> Command {
    Command::new("contract2pdf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generate signed framework agreements as PDF")
        .after_help(
            "EXAMPLES:\n  \
            contract2pdf -n \"Acme GmbH\" -a \"Hauptstraße 1, Berlin\" -p 25 -d 01.02.2025 --password ***\n  \
            contract2pdf -n \"Acme GmbH\" -k Nachbesetzung -k \"Bei Rückzahlung\" --dry-run\n  \
            contract2pdf --list-clauses --verbose\n  \
            contract2pdf --get-default-configuration > contract2pdfrc.toml\n",
        )
        .arg(
            Arg::new("company")
                .short('n')
                .long("company")
                .value_name("NAME")
                .help("Company name of the client"),
        )
        .arg(
            Arg::new("address")
                .short('a')
                .long("address")
                .value_name("ADDRESS")
                .help("Postal address of the client"),
        )
        .arg(
            Arg::new("percentage")
                .short('p')
                .long("percentage")
                .value_name("PERCENT")
                .help("Fee in percent of the annual target salary; '%' is appended if missing"),
        )
        .arg(
            Arg::new("date")
                .short('d')
                .long("date")
                .value_name("DATE")
                .help("Contract date, inserted as written"),
        )
        .arg(
            Arg::new("clause")
                .short('k')
                .long("clause")
                .value_name("LABEL")
                .help("Special agreement to include (can be specified multiple times, order is kept)")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASSWORD")
                .help("Shared password that unlocks generation (or set CONTRACT2PDF_PASSWORD)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("CONFIG_FILE")
                .help("Path to configuration file (TOML format). Auto-detects contract2pdfrc.toml if not specified"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for the generated contract (defaults to the current directory)"),
        )
        .arg(
            Arg::new("html")
                .long("html")
                .value_name("FILE")
                .help("Also write the composed contract markup to FILE"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show detailed output including validation results and file size")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("quiet"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress all output except errors")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Validate input without generating a PDF")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-clauses")
                .long("list-clauses")
                .help("List the available special agreements and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("get-default-configuration")
                .long("get-default-configuration")
                .help("Print a default contract2pdfrc.toml to stdout and exit")
                .action(clap::ArgAction::SetTrue),
        )
}

fn report(e: AppError) {
    match e {
        AppError::ConfigError(e) => error!("[X] Configuration error: {}", e),
        AppError::InputError(e) => error!("[X] Input error: {}", e),
        AppError::AccessError(e) => error!("[X] Access error: {}", e),
        AppError::GenerationError(e) => error!("[X] Generation error: {}", e),
        AppError::FileWriteError(e) => error!("[X] Error writing file: {}", e),
    }
}

fn main() {
    let mut cmd = build_cli();
    let matches = cmd.clone().get_matches();

    // RUST_LOG takes precedence over the verbosity flags
    let verbosity = Verbosity::from_matches(&matches);
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(verbosity.default_log_filter()),
    )
    .format_timestamp_millis()
    .init();

    // Print a default configuration TOML and exit if requested
    if matches.get_flag("get-default-configuration") {
        println!("{}", config::default_config_toml());
        process::exit(0);
    }

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            report(e);
            process::exit(1);
        }
    };

    if matches.get_flag("list-clauses") {
        print_clauses(&config, verbosity);
        process::exit(0);
    }

    if !matches.contains_id("company") {
        let _ = cmd.print_help();
        println!();
        process::exit(1);
    }

    if let Err(e) = run(matches, config) {
        report(e);
        process::exit(1);
    }
}
