//! Stand-ins for the external renderer and encoder executables.
//!
//! All scripts are written once, before any test spawns a process, so no script is
//! ever executed while a forked child could still hold it open for writing.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Argument template matching the fake renderers' positional parameters.
pub const FAKE_RENDERER_ARGUMENTS: &str = "{scene} {total_frames} {frame} {output}";

pub struct FakeTools {
    /// Writes `<scene contents> frame <index> of <total>` as the image.
    pub renderer: PathBuf,

    /// Like `renderer`, but fails on frame 3.
    pub renderer_failing_on_frame_three: PathBuf,

    /// Exits successfully without writing an image.
    pub silent_renderer: PathBuf,

    /// Writes all of its arguments into the file named by its third argument.
    pub arguments_renderer: PathBuf,

    /// Checks for `convert -loop 0 -delay 0`, then concatenates all inputs into the
    /// last argument, so an "animation" is one line per contained frame.
    pub encoder: PathBuf,

    pub failing_encoder: PathBuf,
}

static FAKE_TOOLS: OnceLock<FakeTools> = OnceLock::new();

pub fn fake_tools() -> &'static FakeTools {
    FAKE_TOOLS.get_or_init(|| {
        let directory = tempfile::Builder::new()
            .prefix("fake-tools-")
            .tempdir()
            .unwrap()
            .into_path();

        FakeTools {
            renderer: write_script(
                &directory,
                "renderer",
                r#"printf '%s frame %s of %s\n' "$(cat "$1")" "$3" "$2" > "$4"
"#,
            ),
            renderer_failing_on_frame_three: write_script(
                &directory,
                "failing-renderer",
                r#"if [ "$3" = 3 ]; then exit 2; fi
printf 'frame %s of %s\n' "$3" "$2" > "$4"
"#,
            ),
            silent_renderer: write_script(&directory, "silent-renderer", "exit 0\n"),
            arguments_renderer: write_script(
                &directory,
                "arguments-renderer",
                "echo \"$*\" > \"$3\"\n",
            ),
            encoder: write_script(
                &directory,
                "gm",
                r#"[ "$1" = convert ] && [ "$2" = -loop ] && [ "$3" = 0 ] && [ "$4" = -delay ] && [ "$5" = 0 ] || exit 64
shift 5
count=$#
index=1
for argument in "$@"; do
  if [ "$index" -eq "$count" ]; then output="$argument"; fi
  index=$((index + 1))
done
: > "$output.partial"
index=1
for argument in "$@"; do
  if [ "$index" -lt "$count" ]; then cat "$argument" >> "$output.partial"; fi
  index=$((index + 1))
done
mv "$output.partial" "$output"
"#,
            ),
            failing_encoder: write_script(&directory, "failing-gm", "exit 3\n"),
        }
    })
}

fn write_script(directory: &Path, name: &str, body: &str) -> PathBuf {
    let path = directory.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();

    let mut permissions = fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).unwrap();

    path
}

pub fn lines(image: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(image)
        .lines()
        .map(String::from)
        .collect()
}
