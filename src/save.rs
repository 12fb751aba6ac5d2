use crate::error::{ErrorCode, ErrorRecord};
use crate::fs_utils::{paths_equal_ignore_case, resolve_path};
use crate::template::{TemplateConfig, generate_from_template_with};
use crate::transform::{IndentedTransformer, ReplacedTextTransformer};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Suffix of the marker file written beside each generated file.
pub const GENERATION_DATA_SUFFIX: &str = ".generationdata";

const LAST_MODIFIED_DATE_PARAM: &str = "LastModifiedDate";

/// Path of the generation marker belonging to a generated file.
pub fn generation_data_path(generated_path: &Path) -> PathBuf {
    let mut name = generated_path.as_os_str().to_os_string();
    name.push(GENERATION_DATA_SUFFIX);
    PathBuf::from(name)
}

/// Expands a template and saves the result, refusing to overwrite a
/// previously generated file that was changed outside this tool.
///
/// `generated_path` may be absolute or relative to the template's directory.
/// `None` for the transformer falls back to [`IndentedTransformer`].
///
/// The generated content is written even when expansion reported errors;
/// callers get the full accumulated list either way. A failure to write the
/// marker after a successful content write is reported as
/// [`ErrorCode::FailedToSaveFileGenerationData`] and is not fatal.
pub fn generate_and_save(
    template_path: &Path,
    generated_path: &Path,
    transformer: Option<&dyn ReplacedTextTransformer>,
    config: &TemplateConfig,
) -> Vec<ErrorRecord> {
    let mut errors = Vec::new();

    let template_path = match std::path::absolute(template_path) {
        Ok(path) => path,
        Err(e) => {
            errors.push(ErrorRecord::from_io(
                ErrorCode::CouldNotCalculateAbsoluteFilePath,
                e,
                template_path,
            ));
            return errors;
        }
    };
    let template_dir = template_path.parent().unwrap_or_else(|| Path::new(""));

    let generated_path = match resolve_path(template_dir, generated_path) {
        Ok(path) => path,
        Err(reason) => {
            errors.push(ErrorRecord::new(
                ErrorCode::CouldNotCalculateAbsoluteFilePath,
                format!(
                    "Failed to calculate the generated file path from '{}'. Original error: {reason}",
                    generated_path.display()
                ),
                generated_path,
            ));
            return errors;
        }
    };

    if generated_path.is_dir() {
        errors.push(ErrorRecord::new(
            ErrorCode::CouldNotCalculateAbsoluteFilePath,
            format!(
                "The generated file path '{}' is a directory. Expected a file.",
                generated_path.display()
            ),
            generated_path,
        ));
        return errors;
    }

    if paths_equal_ignore_case(&template_path, &generated_path) {
        errors.push(ErrorRecord::new(
            ErrorCode::TemplateFilePathIsTheSameAsGeneratedFilePath,
            format!(
                "The template file '{}' matches the path of the file to be generated from it. \
                 Generating would overwrite the template mid-run.",
                template_path.display()
            ),
            generated_path,
        ));
        return errors;
    }

    let marker_path = generation_data_path(&generated_path);

    if generated_path.exists() && !generation_is_current(&generated_path, &marker_path) {
        errors.push(ErrorRecord::new(
            ErrorCode::FileGeneratedFromTemplateWasModifiedAfterLastGeneration,
            format!(
                "File '{}' was modified by other application. Please backup the file, \
                 then rename or delete it and try again.",
                generated_path.display()
            ),
            generated_path,
        ));
        return errors;
    }

    let transformer = transformer.unwrap_or(&IndentedTransformer);
    let (generated, mut expansion_errors) =
        generate_from_template_with(&template_path, transformer, config);
    errors.append(&mut expansion_errors);

    if let Err(e) = fs::write(&generated_path, &generated) {
        errors.push(ErrorRecord::from_io(
            ErrorCode::FailedToSaveFileGeneratedFromTemplate,
            e,
            generated_path,
        ));
        return errors;
    }
    debug!(file = %generated_path.display(), bytes = generated.len(), "generated file saved");

    // The content is on disk at this point; a marker fault must not undo that.
    if let Err(e) = write_generation_data(&generated_path, &marker_path) {
        errors.push(ErrorRecord::from_io(
            ErrorCode::FailedToSaveFileGenerationData,
            e,
            generated_path,
        ));
    }

    errors
}

/// True when the marker beside the generated file records exactly the file's
/// current last-write time. Missing or unreadable markers count as stale.
fn generation_is_current(generated_path: &Path, marker_path: &Path) -> bool {
    let Ok(marker) = fs::read_to_string(marker_path) else {
        return false;
    };
    let Some(recorded_ticks) = parse_generation_data(&marker) else {
        return false;
    };
    matches!(last_write_ticks(generated_path), Ok(current) if current == recorded_ticks)
}

fn parse_generation_data(marker: &str) -> Option<u128> {
    let param = marker.find(LAST_MODIFIED_DATE_PARAM)?;
    let rest = &marker[param + LAST_MODIFIED_DATE_PARAM.len()..];
    let colon = rest.find(':')?;
    rest[colon + 1..].trim().parse().ok()
}

fn write_generation_data(generated_path: &Path, marker_path: &Path) -> io::Result<()> {
    let ticks = last_write_ticks(generated_path)?;
    fs::write(marker_path, format!("{LAST_MODIFIED_DATE_PARAM}:{ticks}"))
}

/// The generated file's mtime as integer nanoseconds since the Unix epoch.
fn last_write_ticks(path: &Path) -> io::Result<u128> {
    let modified = fs::metadata(path)?.modified()?;
    modified
        .duration_since(UNIX_EPOCH)
        .map(|since_epoch| since_epoch.as_nanos())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
