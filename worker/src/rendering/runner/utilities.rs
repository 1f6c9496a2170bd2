use std::path::{Path, PathBuf};

use shared::errors::RenderError;

/// Placeholder values substituted into the renderer argument template.
pub struct FrameArguments<'a> {
    pub scene_file_path: &'a Path,
    pub total_frames: usize,
    pub frame_index: usize,
    pub output_file_path: &'a Path,
}

/// Splits a shell-style argument string, e.g. `"+W640 +H480 -D"`.
pub fn parse_shell_arguments(arguments: Option<&str>) -> Result<Vec<String>, RenderError> {
    match arguments {
        Some(arguments) => shlex::split(arguments).ok_or_else(|| {
            RenderError::InvalidArguments(format!("could not parse {arguments:?}"))
        }),
        None => Ok(Vec::new()),
    }
}

/// Parses the argument template and makes sure it references the frame being rendered.
pub fn parse_argument_template(template: &str) -> Result<Vec<String>, RenderError> {
    let arguments = parse_shell_arguments(Some(template))?;

    if !arguments.iter().any(|argument| argument.contains("{frame}")) {
        return Err(RenderError::InvalidArguments(format!(
            "template {template:?} does not contain a {{frame}} placeholder"
        )));
    }

    Ok(arguments)
}

/// Fills `{scene}`, `{total_frames}`, `{frame}` and `{output}` in every template argument.
///
/// Substitution happens after splitting, so paths containing spaces stay one argument.
pub fn fill_argument_template(template: &[String], values: &FrameArguments) -> Vec<String> {
    let scene = values.scene_file_path.to_string_lossy();
    let output = values.output_file_path.to_string_lossy();
    let total_frames = values.total_frames.to_string();
    let frame = values.frame_index.to_string();

    template
        .iter()
        .map(|argument| {
            argument
                .replace("{scene}", &scene)
                .replace("{total_frames}", &total_frames)
                .replace("{frame}", &frame)
                .replace("{output}", &output)
        })
        .collect()
}

/// Finds the image a renderer wrote into its (otherwise empty) frame directory.
///
/// Some renderers decorate the requested output name (POV-Ray appends the frame
/// number when rendering animations), so when `expected_output` is missing the
/// first file in `frame_directory` is taken instead.
pub fn locate_rendered_image(
    frame_directory: &Path,
    expected_output: &Path,
) -> std::io::Result<Option<PathBuf>> {
    if expected_output.is_file() {
        return Ok(Some(expected_output.to_path_buf()));
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(frame_directory)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    candidates.sort();

    Ok(candidates.into_iter().next())
}
