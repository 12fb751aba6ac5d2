//! # docweave
//!
//! A library and CLI tool for generating documents from templates that
//! reference other files through include placeholders. Designed for composing
//! documentation (README files and the like) from fragments scattered across
//! a project: each `<IncludedFilePlaceHolder>path</IncludedFilePlaceHolder>`
//! element is replaced by the referenced file's contents, which may in turn
//! contain placeholders of their own.
//!
//! ## Features
//!
//! - Recursive expansion of file-include placeholders
//! - Self-reference and circular-reference detection over the active
//!   inclusion chain
//! - Structured, position-tracked errors accumulated without aborting the run
//! - Pluggable replaced-text transformation (indent inclusions to the
//!   placeholder's column, or splice them in verbatim)
//! - Safe overwrite: saving refuses to clobber a generated file that was
//!   edited by hand since the last generation
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use docweave::{TemplateConfig, generate_from_template};
//! use std::path::Path;
//!
//! let config = TemplateConfig::default();
//! let (text, errors) = generate_from_template(Path::new("README.tpl.md"), &config);
//!
//! for error in &errors {
//!     eprintln!("{}: {}", error.file().display(), error);
//! }
//! print!("{text}");
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Expand a template to stdout
//! docweave README.tpl.md
//!
//! # Save through the overwrite guard
//! docweave README.tpl.md -o README.md
//!
//! # Expand a template from stdin
//! echo '<IncludedFilePlaceHolder>intro.md</IncludedFilePlaceHolder>' | docweave -
//!
//! # List the references a template makes
//! docweave README.tpl.md --list=json
//! ```

pub mod error;
pub mod fs_utils;
pub mod save;
pub mod template;
pub mod transform;

// Re-export main types and functions for convenience
pub use error::{ErrorCode, ErrorRecord};
pub use save::{GENERATION_DATA_SUFFIX, generate_and_save, generation_data_path};
pub use template::{
    DEFAULT_TAG_NAME, IncludeRef, TemplateConfig, find_include_refs, generate_from_template,
    generate_from_template_with, generate_from_text,
};
pub use transform::{IndentedTransformer, NoTransformation, ReplacedTextTransformer};
