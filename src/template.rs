use crate::error::{ErrorCode, ErrorRecord};
use crate::fs_utils::{LoadFailure, paths_equal_ignore_case, read_file_contents, resolve_path};
use crate::transform::{IndentedTransformer, ReplacedTextTransformer};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Element name used for include placeholders when none is configured.
pub const DEFAULT_TAG_NAME: &str = "IncludedFilePlaceHolder";

/// Configuration for template expansion
#[derive(Debug, Clone)]
pub struct TemplateConfig {
    /// Element name delimiting include placeholders, matched literally as
    /// `<name>` / `</name>`
    pub tag_name: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            tag_name: DEFAULT_TAG_NAME.to_string(),
        }
    }
}

impl TemplateConfig {
    fn opening_tag(&self) -> String {
        format!("<{}>", self.tag_name)
    }

    fn closing_tag(&self) -> String {
        format!("</{}>", self.tag_name)
    }
}

/// An include placeholder found in template text
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeRef {
    /// The referenced path text between the tags, trimmed
    pub reference: String,
    /// Byte offset of the opening tag
    pub start: usize,
    /// Byte offset just past the closing tag
    pub end: usize,
    /// Byte offset where the path text begins (just past the opening tag)
    pub path_position: usize,
}

/// Finds all complete include placeholders in the given text.
///
/// The scan is literal and case-sensitive; placeholders do not nest. An
/// opening tag without a closing tag after it ends the scan, matching how
/// expansion treats the rest of such a document as plain text.
pub fn find_include_refs(text: &str, config: &TemplateConfig) -> Vec<IncludeRef> {
    let opening_tag = config.opening_tag();
    let closing_tag = config.closing_tag();

    let mut refs = Vec::new();
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(&opening_tag) {
        let start = cursor + found;
        let path_position = start + opening_tag.len();

        let Some(found_close) = text[path_position..].find(&closing_tag) else {
            break;
        };
        let close_start = path_position + found_close;
        let end = close_start + closing_tag.len();

        refs.push(IncludeRef {
            reference: text[path_position..close_start].trim().to_string(),
            start,
            end,
            path_position,
        });
        cursor = end;
    }

    refs
}

/// Expands a template file into a single merged document, indenting each
/// inclusion to the column of its placeholder.
///
/// Returns the best-effort generated text together with every condition
/// reported along the way; a non-empty error list does not imply empty
/// output. If the template itself cannot be loaded, the text is empty and
/// the list holds a single error.
pub fn generate_from_template(
    template_path: &Path,
    config: &TemplateConfig,
) -> (String, Vec<ErrorRecord>) {
    generate_from_template_with(template_path, &IndentedTransformer, config)
}

/// Like [`generate_from_template`], with an explicit replaced-text
/// transformer.
pub fn generate_from_template_with(
    template_path: &Path,
    transformer: &dyn ReplacedTextTransformer,
    config: &TemplateConfig,
) -> (String, Vec<ErrorRecord>) {
    let mut errors = Vec::new();

    let template_path = match absolute_template_path(template_path, &mut errors) {
        Some(path) => path,
        None => return (String::new(), errors),
    };

    let text = match read_file_contents(&template_path) {
        Ok(text) => text,
        Err(failure) => {
            errors.push(load_failure_record(failure, &template_path, &template_path));
            return (String::new(), errors);
        }
    };

    let mut visited = Vec::new();
    let generated = expand_document(
        &template_path,
        &text,
        transformer,
        config,
        &mut visited,
        &mut errors,
    );
    (generated, errors)
}

/// Expands already-loaded template text as if it lived at `document_path`.
/// Relative references resolve against that path's directory.
pub fn generate_from_text(
    text: &str,
    document_path: &Path,
    transformer: &dyn ReplacedTextTransformer,
    config: &TemplateConfig,
) -> (String, Vec<ErrorRecord>) {
    let mut errors = Vec::new();

    let document_path = match absolute_template_path(document_path, &mut errors) {
        Some(path) => path,
        None => return (String::new(), errors),
    };

    let mut visited = Vec::new();
    let generated = expand_document(
        &document_path,
        text,
        transformer,
        config,
        &mut visited,
        &mut errors,
    );
    (generated, errors)
}

fn absolute_template_path(path: &Path, errors: &mut Vec<ErrorRecord>) -> Option<PathBuf> {
    match std::path::absolute(path) {
        Ok(absolute) => Some(absolute),
        Err(e) => {
            errors.push(ErrorRecord::from_io(
                ErrorCode::CouldNotCalculateAbsoluteFilePath,
                e,
                path,
            ));
            None
        }
    }
}

fn load_failure_record(failure: LoadFailure, loaded_path: &Path, reported_in: &Path) -> ErrorRecord {
    match failure {
        LoadFailure::NotFound => ErrorRecord::new(
            ErrorCode::FileDoesNotExist,
            format!("File '{}' does not exist.", loaded_path.display()),
            reported_in,
        ),
        LoadFailure::Read(e) => ErrorRecord::from_io(ErrorCode::FileFailedToLoad, e, reported_in),
    }
}

/// Expands one document. `visited` holds the inclusion chain from the root
/// to this document; the entry pushed here is popped again on every exit
/// path, so references at shallower depths always see a correct chain.
fn expand_document(
    path: &Path,
    text: &str,
    transformer: &dyn ReplacedTextTransformer,
    config: &TemplateConfig,
    visited: &mut Vec<PathBuf>,
    errors: &mut Vec<ErrorRecord>,
) -> String {
    let opening_tag = config.opening_tag();
    let closing_tag = config.closing_tag();

    visited.push(path.to_path_buf());
    debug!(file = %path.display(), depth = visited.len(), "expanding document");

    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;

    loop {
        let Some(found) = text[cursor..].find(&opening_tag) else {
            output.push_str(&text[cursor..]);
            break;
        };
        let tag_start = cursor + found;
        let path_position = tag_start + opening_tag.len();

        let Some(found_close) = text[path_position..].find(&closing_tag) else {
            errors.push(
                ErrorRecord::new(
                    ErrorCode::ClosingTagMissing,
                    format!(
                        "Missing closing tag for opening tag '{}' in template file.",
                        config.tag_name
                    ),
                    path,
                )
                .at(tag_start),
            );

            // Terminal for this document only: the unscanned tail, bad tag
            // included, is emitted verbatim so no data is lost.
            output.push_str(&text[cursor..]);
            break;
        };
        let close_start = path_position + found_close;

        output.push_str(&text[cursor..tag_start]);
        let reference = text[path_position..close_start].trim();
        cursor = close_start + closing_tag.len();

        expand_reference(
            path,
            text,
            tag_start,
            path_position,
            reference,
            transformer,
            config,
            visited,
            errors,
            &mut output,
        );
    }

    visited.pop();
    output
}

/// Handles a single include placeholder: resolve, cycle-check, load, recurse,
/// transform, splice. Every failure is recorded and leaves the scan free to
/// continue after the closing tag.
#[allow(clippy::too_many_arguments)]
fn expand_reference(
    parent: &Path,
    parent_text: &str,
    tag_start: usize,
    path_position: usize,
    reference: &str,
    transformer: &dyn ReplacedTextTransformer,
    config: &TemplateConfig,
    visited: &mut Vec<PathBuf>,
    errors: &mut Vec<ErrorRecord>,
    output: &mut String,
) {
    let base_dir = parent.parent().unwrap_or_else(|| Path::new(""));

    let resolved = match resolve_path(base_dir, Path::new(reference)) {
        Ok(path) => path,
        Err(reason) => {
            errors.push(
                ErrorRecord::new(
                    ErrorCode::CouldNotCalculateAbsoluteFilePath,
                    format!(
                        "Failed to calculate absolute file path from path '{reference}'. Original error: {reason}"
                    ),
                    parent,
                )
                .at(path_position),
            );
            return;
        }
    };

    if resolved.is_dir() {
        errors.push(
            ErrorRecord::new(
                ErrorCode::CouldNotCalculateAbsoluteFilePath,
                format!(
                    "Failed to calculate absolute file path from path '{reference}'. The specified path is a directory. Expected a file."
                ),
                parent,
            )
            .at(path_position),
        );
        return;
    }

    match visited
        .iter()
        .rposition(|seen| paths_equal_ignore_case(seen, &resolved))
    {
        None => {}
        Some(index) if index == visited.len() - 1 => {
            errors.push(
                ErrorRecord::new(
                    ErrorCode::TemplateFileReferencesItself,
                    format!(
                        "File '{}' references itself. Invalid included file path in element '{}' is '{reference}'.",
                        parent.display(),
                        config.tag_name
                    ),
                    parent,
                )
                .at(path_position),
            );
            return;
        }
        Some(index) => {
            let chain = circular_reference_chain(&visited[index..], parent, &resolved);
            // The chain is spliced into the output too, so the cycle is
            // visible in the generated document and not only in the error
            // list.
            output.push_str(&chain);
            errors.push(
                ErrorRecord::new(ErrorCode::CircularReferences, chain, parent).at(path_position),
            );
            return;
        }
    }

    let referenced_text = match read_file_contents(&resolved) {
        Ok(text) => text,
        Err(failure) => {
            errors.push(load_failure_record(failure, &resolved, parent).at(path_position));
            errors.push(
                ErrorRecord::new(
                    ErrorCode::FailedToLoadReferencedFile,
                    format!(
                        "Failed to load the referenced file '{}' specified as '{reference}' in element '{}'.",
                        resolved.display(),
                        config.tag_name
                    ),
                    parent,
                )
                .at(path_position),
            );
            return;
        }
    };

    let replaced = expand_document(
        &resolved,
        &referenced_text,
        transformer,
        config,
        visited,
        errors,
    );
    output.push_str(&transformer.transform(
        &replaced,
        parent,
        parent_text,
        tag_start,
        &resolved,
    ));
}

/// Describes a cycle like File1=>File2=>File3=>File2, one line per hop, from
/// the earlier occurrence of the repeated document to the new reference.
fn circular_reference_chain(active_chain: &[PathBuf], parent: &Path, repeated: &Path) -> String {
    let mut message = format!(
        "File '{}' referenced from '{}' results in the following circular references:\n",
        repeated.display(),
        parent.display()
    );

    let mut chain: Vec<&Path> = active_chain.iter().map(PathBuf::as_path).collect();
    chain.push(repeated);

    for hop in chain.windows(2) {
        let _ = writeln!(
            message,
            "\tFile '{}' references '{}'",
            hop[0].display(),
            hop[1].display()
        );
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::NoTransformation;
    use std::fs;
    use tempfile::TempDir;

    const TAG: &str = DEFAULT_TAG_NAME;

    fn include(path: &str) -> String {
        format!("<{TAG}>{path}</{TAG}>")
    }

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn expand(path: &Path) -> (String, Vec<ErrorRecord>) {
        generate_from_template_with(path, &NoTransformation, &TemplateConfig::default())
    }

    #[test]
    fn test_no_placeholders_returns_text_unchanged() {
        let dir = TempDir::new().unwrap();
        let template = write_file(&dir, "plain.md", "No placeholders here.\nJust text.\n");

        let (text, errors) = expand(&template);
        assert_eq!(text, "No placeholders here.\nJust text.\n");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_single_inclusion() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "part.md", "included content");
        let template = write_file(
            &dir,
            "root.md",
            &format!("before {} after", include("part.md")),
        );

        let (text, errors) = expand(&template);
        assert_eq!(text, "before included content after");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_nested_inclusion() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "leaf.md", "leaf");
        write_file(&dir, "mid.md", &format!("[{}]", include("leaf.md")));
        let template = write_file(&dir, "root.md", &format!("({})", include("mid.md")));

        let (text, errors) = expand(&template);
        assert_eq!(text, "([leaf])");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_reference_path_is_trimmed() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "part.md", "x");
        let template = write_file(
            &dir,
            "root.md",
            &format!("<{TAG}>  part.md\t</{TAG}>"),
        );

        let (text, errors) = expand(&template);
        assert_eq!(text, "x");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_reference_in_subdirectory_resolves_against_including_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        // sub/mid.md references sibling.md relative to sub/, not to the root
        write_file(&dir, "sub/sibling.md", "sibling");
        write_file(&dir, "sub/mid.md", &include("sibling.md"));
        let template = write_file(&dir, "root.md", &include("sub/mid.md"));

        let (text, errors) = expand(&template);
        assert_eq!(text, "sibling");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_template_returns_single_error_and_empty_text() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.md");

        let (text, errors) = expand(&missing);
        assert_eq!(text, "");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::FileDoesNotExist);
        assert_eq!(errors[0].position, None);
    }

    #[test]
    fn test_missing_referenced_file_reports_two_errors_and_continues() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "ok.md", "ok");
        let template = write_file(
            &dir,
            "root.md",
            &format!("a {} b {} c", include("gone.md"), include("ok.md")),
        );

        let (text, errors) = expand(&template);
        // Nothing is emitted for the bad reference; the rest still expands.
        assert_eq!(text, "a  b ok c");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].code, ErrorCode::FileDoesNotExist);
        assert_eq!(errors[1].code, ErrorCode::FailedToLoadReferencedFile);
        assert!(errors[1].message.contains("gone.md"));
        // Both point at the path text inside the tag, in the parent's raw text.
        let path_position = 2 + format!("<{TAG}>").len();
        assert_eq!(errors[0].position, Some(path_position));
        assert_eq!(errors[1].position, Some(path_position));
    }

    #[test]
    fn test_directory_reference_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        let template = write_file(&dir, "root.md", &include("subdir"));

        let (text, errors) = expand(&template);
        assert_eq!(text, "");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::CouldNotCalculateAbsoluteFilePath);
        assert!(errors[0].message.contains("Expected a file"));
    }

    #[test]
    fn test_unterminated_tag_keeps_document_verbatim() {
        let dir = TempDir::new().unwrap();
        let config = TemplateConfig {
            tag_name: "Tag".to_string(),
        };
        let template = write_file(&dir, "root.md", "head <Tag>path");

        let (text, errors) =
            generate_from_template_with(&template, &NoTransformation, &config);
        assert_eq!(text, "head <Tag>path");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::ClosingTagMissing);
        assert_eq!(errors[0].position, Some(5));
    }

    #[test]
    fn test_unterminated_tag_truncates_only_that_document() {
        let dir = TempDir::new().unwrap();
        // The bad tag stops scanning inside bad.md, but the parent continues.
        write_file(&dir, "bad.md", &format!("x <{TAG}>never-closed"));
        write_file(&dir, "ok.md", "ok");
        let template = write_file(
            &dir,
            "root.md",
            &format!("{} | {}", include("bad.md"), include("ok.md")),
        );

        let (text, errors) = expand(&template);
        assert_eq!(text, format!("x <{TAG}>never-closed | ok"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::ClosingTagMissing);
        assert!(errors[0].file().ends_with("bad.md"));
    }

    #[test]
    fn test_self_reference_emits_nothing_and_keeps_surrounding_text() {
        let dir = TempDir::new().unwrap();
        let template = write_file(
            &dir,
            "selfref.md",
            &format!("before {} after", include("selfref.md")),
        );

        let (text, errors) = expand(&template);
        assert_eq!(text, "before  after");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::TemplateFileReferencesItself);
        assert!(errors[0].message.contains("references itself"));
    }

    #[test]
    fn test_circular_reference_chain_reported_once_and_spliced_inline() {
        let dir = TempDir::new().unwrap();
        let b_path = dir.path().join("b.md");
        let c_path = dir.path().join("c.md");
        write_file(&dir, "c.md", &include("b.md"));
        write_file(&dir, "b.md", &include("c.md"));
        let template = write_file(&dir, "a.md", &include("b.md"));

        let (text, errors) = expand(&template);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::CircularReferences);

        // The chain covers b -> c -> b, one line per hop.
        let message = &errors[0].message;
        assert!(message.contains(&format!(
            "File '{}' references '{}'",
            b_path.display(),
            c_path.display()
        )));
        assert!(message.contains(&format!(
            "File '{}' references '{}'",
            c_path.display(),
            b_path.display()
        )));
        // The cycle is detected in c.md, where the repeated reference sits.
        assert!(errors[0].file().ends_with("c.md"));

        // The same description is visible inline in the output.
        assert!(!text.is_empty());
        assert_eq!(text, *message);
    }

    #[test]
    fn test_diamond_inclusion_is_not_a_cycle() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "d.md", "D");
        write_file(&dir, "b.md", &include("d.md"));
        write_file(&dir, "c.md", &include("d.md"));
        let template = write_file(
            &dir,
            "a.md",
            &format!("{}+{}", include("b.md"), include("c.md")),
        );

        let (text, errors) = expand(&template);
        assert_eq!(text, "D+D");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_same_file_included_twice_from_one_document() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "part.md", "P");
        let template = write_file(
            &dir,
            "root.md",
            &format!("{} {}", include("part.md"), include("part.md")),
        );

        let (text, errors) = expand(&template);
        assert_eq!(text, "P P");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_expansion_is_idempotent_over_unmodified_files() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "leaf.md", "leaf\ntext");
        write_file(&dir, "mid.md", &format!("- item: {}", include("leaf.md")));
        let template = write_file(&dir, "root.md", &include("mid.md"));

        let config = TemplateConfig::default();
        let (first, first_errors) = generate_from_template(&template, &config);
        let (second, second_errors) = generate_from_template(&template, &config);
        assert_eq!(first, second);
        assert!(first_errors.is_empty());
        assert!(second_errors.is_empty());
    }

    #[test]
    fn test_default_transformer_indents_inclusions() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "f.md", "line1\nline2");
        let template = write_file(&dir, "root.md", &format!("  - X: {}", include("f.md")));

        let (text, errors) =
            generate_from_template(&template, &TemplateConfig::default());
        assert_eq!(text, "  - X: line1\n       line2");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_custom_tag_name() {
        let dir = TempDir::new().unwrap();
        let config = TemplateConfig {
            tag_name: "Include".to_string(),
        };
        write_file(&dir, "part.md", "content");
        let template = write_file(
            &dir,
            "root.md",
            &format!("<Include>part.md</Include> and {}", include("part.md")),
        );

        let (text, errors) = generate_from_template_with(&template, &NoTransformation, &config);
        // Only the configured tag is expanded; the default-named one is text.
        assert_eq!(text, format!("content and {}", include("part.md")));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_errors_are_collected_in_discovery_order() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "inner.md", &include("gone-inner.md"));
        let template = write_file(
            &dir,
            "root.md",
            &format!("{} {}", include("inner.md"), include("gone-root.md")),
        );

        let (_, errors) = expand(&template);
        // Depth-first: inner.md's failure comes before the root's own.
        assert_eq!(errors.len(), 4);
        assert!(errors[0].message.contains("gone-inner.md"));
        assert!(errors[2].message.contains("gone-root.md"));
    }

    #[test]
    fn test_generate_from_text_resolves_against_document_dir() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "part.md", "from disk");
        let pseudo = dir.path().join("stdin");

        let (text, errors) = generate_from_text(
            &include("part.md"),
            &pseudo,
            &NoTransformation,
            &TemplateConfig::default(),
        );
        assert_eq!(text, "from disk");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_find_include_refs() {
        let text = format!(
            "a {} b {} c",
            include("one.md"),
            include("  two.md ")
        );
        let refs = find_include_refs(&text, &TemplateConfig::default());

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].reference, "one.md");
        assert_eq!(refs[0].start, 2);
        assert_eq!(refs[0].path_position, 2 + format!("<{TAG}>").len());
        assert_eq!(refs[1].reference, "two.md");
        assert!(refs[1].start > refs[0].end);
    }

    #[test]
    fn test_find_include_refs_stops_at_unterminated_tag() {
        let text = format!("{} tail <{TAG}>open", include("a.md"));
        let refs = find_include_refs(&text, &TemplateConfig::default());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].reference, "a.md");
    }

    #[test]
    fn test_find_include_refs_empty_text() {
        assert!(find_include_refs("", &TemplateConfig::default()).is_empty());
        assert!(find_include_refs("no tags", &TemplateConfig::default()).is_empty());
    }
}
