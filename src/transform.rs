use std::path::Path;

/// Post-processes the text produced by expanding a referenced file before it
/// is spliced into the parent document.
///
/// `template_text` is the parent document's raw text and `tag_offset` is the
/// byte offset of the include tag within it; together they let a transformer
/// inspect the context the replacement lands in. `referenced_path` is the
/// resolved absolute path of the file the text came from.
pub trait ReplacedTextTransformer {
    fn transform(
        &self,
        replaced_text: &str,
        template_path: &Path,
        template_text: &str,
        tag_offset: usize,
        referenced_path: &Path,
    ) -> String;
}

/// Splices the replaced text in unchanged.
pub struct NoTransformation;

impl ReplacedTextTransformer for NoTransformation {
    fn transform(
        &self,
        replaced_text: &str,
        _template_path: &Path,
        _template_text: &str,
        _tag_offset: usize,
        _referenced_path: &Path,
    ) -> String {
        replaced_text.to_string()
    }
}

/// Indents every line after the first to the column where the include tag
/// began, so multi-line inclusions stay visually aligned in the parent.
///
/// A parent line `- Feature1: <IncludedFilePlaceHolder>f.md</...>` whose
/// referenced file holds two lines produces
///
/// ```text
/// - Feature1: This is
///             cool feature 1.
/// ```
pub struct IndentedTransformer;

impl ReplacedTextTransformer for IndentedTransformer {
    fn transform(
        &self,
        replaced_text: &str,
        _template_path: &Path,
        template_text: &str,
        tag_offset: usize,
        _referenced_path: &Path,
    ) -> String {
        if !replaced_text.contains('\n') {
            return replaced_text.to_string();
        }

        let indent = indent_before(template_text, tag_offset);

        let mut transformed = String::with_capacity(replaced_text.len() + indent.len() * 8);
        for (index, line) in replaced_text.split('\n').enumerate() {
            if index > 0 {
                transformed.push('\n');
                // Empty lines stay empty rather than carrying trailing
                // whitespace.
                if !(line.is_empty() || line == "\r") {
                    transformed.push_str(&indent);
                }
            }
            transformed.push_str(line);
        }
        transformed
    }
}

/// Everything between the previous line break and the tag, with whitespace
/// kept verbatim (tabs stay tabs) and any other character widened to a single
/// space so the column width is preserved.
fn indent_before(template_text: &str, tag_offset: usize) -> String {
    let line_start = template_text[..tag_offset]
        .rfind('\n')
        .map_or(0, |index| index + 1);

    template_text[line_start..tag_offset]
        .chars()
        .map(|c| if c.is_whitespace() { c } else { ' ' })
        .collect()
}
