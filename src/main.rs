use clap::{Parser, ValueEnum};
use docweave::{
    ErrorRecord, IndentedTransformer, NoTransformation, ReplacedTextTransformer, TemplateConfig,
    find_include_refs, fs_utils, generate_and_save, generate_from_template_with,
    generate_from_text,
};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const LONG_HELP: &str = r#"
Placeholder syntax:
  <IncludedFilePlaceHolder>path</IncludedFilePlaceHolder>

  The path may be relative (resolved against the directory of the file the
  placeholder appears in) or absolute. Referenced files may contain
  placeholders of their own; self-references and reference cycles are
  detected and reported instead of looping.

Examples:
  # Expand a template to stdout
  docweave README.tpl.md
  # Save the result next to the template, guarded against manual edits
  docweave README.tpl.md -o README.md
  # Expand from stdin, resolving references against a project directory
  cat README.tpl.md | docweave - --base-dir /path/to/project
  # Splice inclusions verbatim instead of indenting them
  docweave README.tpl.md --transform none
  # List all references in a template
  docweave README.tpl.md --list=detailed
  # Output references as JSON for scripting
  docweave README.tpl.md --list=json
  # Check that every reference resolves (dry run)
  docweave README.tpl.md --dry-run

Template example:
  # My Project
  <IncludedFilePlaceHolder>docs/summary.md</IncludedFilePlaceHolder>
  ## Feature 1
  - Feature1: <IncludedFilePlaceHolder>Feature1/README.md</IncludedFilePlaceHolder>
"#;

/// Generate documents from templates with recursive file-include placeholders.
#[derive(Parser, Debug)]
#[command(
    name = "docweave",
    version,
    about = "Generate documents from templates with recursive file-include placeholders.",
    after_long_help = LONG_HELP
)]
struct Cli {
    /// Template file to expand. Use '-' for stdin.
    #[arg(value_name = "TEMPLATE")]
    template: PathBuf,

    /// Save the result to FILE through the overwrite guard instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Base directory for resolving references of a stdin template
    #[arg(short, long, value_name = "DIR", env = "DOCWEAVE_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Element name of the include placeholder tag
    #[arg(long, value_name = "NAME", default_value = docweave::DEFAULT_TAG_NAME)]
    tag: String,

    /// How to transform included text before splicing it in
    #[arg(long, value_enum, default_value = "indented")]
    transform: TransformKind,

    /// List references in the template (optionally with format: plain, detailed, json)
    #[arg(long, value_name = "FORMAT", num_args = 0..=1, default_missing_value = "plain", conflicts_with = "dry_run")]
    list: Option<ListFormat>,

    /// Validate that every reference resolves, without expanding
    #[arg(long, conflicts_with = "list")]
    dry_run: bool,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TransformKind {
    /// Indent every included line after the first to the placeholder's column
    Indented,
    /// Splice included text in unchanged
    None,
}

impl TransformKind {
    fn transformer(self) -> &'static dyn ReplacedTextTransformer {
        match self {
            Self::Indented => &IndentedTransformer,
            Self::None => &NoTransformation,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum ListFormat {
    /// Simple list of referenced paths
    Plain,
    /// Detailed information about each reference
    Detailed,
    /// JSON output for scripting
    Json,
}

#[derive(Serialize)]
struct ReferenceInfo {
    reference: String,
    start: usize,
    end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let config = TemplateConfig {
        tag_name: cli.tag.clone(),
    };

    match run(&cli, &config) {
        Ok(error_count) if error_count > 0 => std::process::exit(1),
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Runs the selected mode and returns the number of reported problems.
fn run(cli: &Cli, config: &TemplateConfig) -> io::Result<usize> {
    if cli.list.is_some() || cli.dry_run {
        let (text, document_path) = read_template(cli)?;
        let base_dir = document_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        return if let Some(format) = cli.list {
            list_references(&text, format, &base_dir, config)
        } else {
            Ok(dry_run(&text, &base_dir, config))
        };
    }

    let transformer = cli.transform.transformer();

    if let Some(output) = &cli.output {
        if is_stdin(&cli.template) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "saving with the overwrite guard requires a template file, not stdin",
            ));
        }
        let errors = generate_and_save(&cli.template, output, Some(transformer), config);
        report_errors(&errors);
        if errors.is_empty() {
            info!(output = %output.display(), "generated file saved");
        }
        return Ok(errors.len());
    }

    let (generated, errors) = if is_stdin(&cli.template) {
        let (text, document_path) = read_template(cli)?;
        generate_from_text(&text, &document_path, transformer, config)
    } else {
        generate_from_template_with(&cli.template, transformer, config)
    };

    report_errors(&errors);
    print!("{generated}");
    io::stdout().flush()?;
    Ok(errors.len())
}

fn is_stdin(template: &Path) -> bool {
    template == Path::new("-")
}

/// Loads the template text and the document path it should be treated as
/// living at. Stdin templates are anchored inside the base directory.
fn read_template(cli: &Cli) -> io::Result<(String, PathBuf)> {
    if is_stdin(&cli.template) {
        info!("reading template from stdin");
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;

        let base_dir = match &cli.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Ok((buffer, base_dir.join("stdin")))
    } else {
        info!(template = %cli.template.display(), "reading template");
        let text = std::fs::read_to_string(&cli.template)?;
        Ok((text, cli.template.clone()))
    }
}

fn report_errors(errors: &[ErrorRecord]) {
    for record in errors {
        match record.position {
            Some(position) => eprintln!(
                "error[{:?}]: {} ({}, offset {})",
                record.code,
                record,
                record.file().display(),
                position
            ),
            None => eprintln!(
                "error[{:?}]: {} ({})",
                record.code,
                record,
                record.file().display()
            ),
        }
    }
}

fn dry_run(text: &str, base_dir: &Path, config: &TemplateConfig) -> usize {
    let references = find_include_refs(text, config);

    let mut invalid_count = 0;
    for reference in &references {
        match fs_utils::resolve_path(base_dir, Path::new(&reference.reference)) {
            Ok(path) if path.is_file() => {
                println!("✓ {} -> {}", reference.reference, path.display());
            }
            Ok(path) => {
                println!(
                    "✗ {} -> {} (not found)",
                    reference.reference,
                    path.display()
                );
                invalid_count += 1;
            }
            Err(reason) => {
                println!("✗ {} -> Error: {}", reference.reference, reason);
                invalid_count += 1;
            }
        }
    }

    println!("\nSummary: {} references found", references.len());
    if references.len() > invalid_count {
        println!("  ✓ {} valid", references.len() - invalid_count);
    }
    if invalid_count > 0 {
        println!("  ✗ {invalid_count} invalid");
    }

    invalid_count
}

fn list_references(
    text: &str,
    format: ListFormat,
    base_dir: &Path,
    config: &TemplateConfig,
) -> io::Result<usize> {
    let references = find_include_refs(text, config);

    match format {
        ListFormat::Plain => {
            for reference in &references {
                println!("{}", reference.reference);
            }
        }
        ListFormat::Detailed => {
            for reference in &references {
                println!("Reference: {}", reference.reference);
                println!("  Position: {}..{}", reference.start, reference.end);

                match fs_utils::resolve_path(base_dir, Path::new(&reference.reference)) {
                    Ok(path) => {
                        println!("  Path: {}", path.display());
                        println!("  Exists: {}", if path.is_file() { "yes" } else { "no" });
                    }
                    Err(reason) => {
                        println!("  Error: {reason}");
                    }
                }
                println!();
            }
        }
        ListFormat::Json => {
            let infos: Vec<ReferenceInfo> = references
                .iter()
                .map(|reference| {
                    let mut info = ReferenceInfo {
                        reference: reference.reference.clone(),
                        start: reference.start,
                        end: reference.end,
                        path: None,
                        exists: None,
                        error: None,
                    };
                    match fs_utils::resolve_path(base_dir, Path::new(&reference.reference)) {
                        Ok(path) => {
                            info.exists = Some(path.is_file());
                            info.path = Some(path.display().to_string());
                        }
                        Err(reason) => info.error = Some(reason),
                    }
                    info
                })
                .collect();

            let json = serde_json::to_string_pretty(&infos)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            println!("{json}");
        }
    }

    Ok(0)
}

fn init_tracing(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .init();
}
