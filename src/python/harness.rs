//! The Python program wrapped around caller-supplied plotting code, and the
//! stdout marker protocol it uses to hand a PNG back to the executor.

use base64::Engine;

pub const IMAGE_START_MARKER: &str = "===IMAGE_B64_START===";
pub const IMAGE_END_MARKER: &str = "===IMAGE_B64_END===";

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Tokens `@@...@@` are substituted by `wrap_source`.
///
/// Order matters: the Agg backend is selected before anything else imports
/// pyplot. `figure` and `show` are hooked so a figure stays reachable even if
/// the wrapped code closes it after saving.
const HARNESS_TEMPLATE: &str = r#"import base64 as _cg_base64
import io as _cg_io
import sys as _cg_sys
import traceback as _cg_traceback

try:
    import matplotlib as _cg_matplotlib
    _cg_matplotlib.use("Agg")
    import matplotlib.pyplot as _cg_plt
except ImportError:
    _cg_plt = None

_cg_figures = []

if _cg_plt is not None:
    _cg_original_figure = _cg_plt.figure

    def _cg_tracking_figure(*args, **kwargs):
        fig = _cg_original_figure(*args, **kwargs)
        if fig in _cg_figures:
            _cg_figures.remove(fig)
        _cg_figures.append(fig)
        return fig

    def _cg_capture_show(*args, **kwargs):
        if _cg_plt.get_fignums():
            fig = _cg_plt.gcf()
            if fig in _cg_figures:
                _cg_figures.remove(fig)
            _cg_figures.append(fig)

    _cg_plt.figure = _cg_tracking_figure
    _cg_plt.show = _cg_capture_show

_cg_source = _cg_base64.b64decode("@@SOURCE_B64@@").decode("utf-8")

try:
    exec(compile(_cg_source, "<chart>", "exec"), {"__name__": "__main__"})
except SystemExit as _cg_exit:
    if _cg_exit.code not in (None, 0):
        raise
except BaseException:
    _cg_traceback.print_exc()
    _cg_sys.stderr.flush()
    _cg_sys.exit(1)


def _cg_latest_figure():
    if _cg_plt is None:
        return None
    if _cg_plt.get_fignums():
        return _cg_plt.gcf()
    if _cg_figures:
        return _cg_figures[-1]
    return None


_cg_figure = _cg_latest_figure()
if _cg_figure is not None:
    _cg_buffer = _cg_io.BytesIO()
    _cg_figure.savefig(
        _cg_buffer,
        format="png",
        dpi=100,
        bbox_inches="tight",
        facecolor=_cg_figure.get_facecolor(),
    )
    _cg_sys.stdout.write("\n@@START_MARKER@@\n")
    _cg_sys.stdout.write(_cg_base64.b64encode(_cg_buffer.getvalue()).decode("ascii"))
    _cg_sys.stdout.write("\n@@END_MARKER@@\n")
    _cg_sys.stdout.flush()
"#;

/// Build the harness program around `user_source`.
///
/// The source is embedded base64-encoded, so no quoting of the caller's code
/// is ever needed.
pub fn wrap_source(user_source: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(user_source.as_bytes());
    HARNESS_TEMPLATE
        .replace("@@SOURCE_B64@@", &encoded)
        .replace("@@START_MARKER@@", IMAGE_START_MARKER)
        .replace("@@END_MARKER@@", IMAGE_END_MARKER)
}

/// Payload between the last start marker and its end marker.
///
/// A start marker with no matching end marker after it yields `None`.
pub fn extract_image_payload(stdout: &str) -> Option<String> {
    let mut current: Option<String> = None;
    let mut completed: Option<String> = None;

    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed == IMAGE_START_MARKER {
            current = Some(String::new());
        } else if trimmed == IMAGE_END_MARKER {
            if let Some(payload) = current.take() {
                completed = Some(payload);
            }
        } else if let Some(payload) = current.as_mut() {
            payload.push_str(trimmed);
        }
    }

    if current.is_some() {
        return None;
    }
    completed.filter(|p| !p.is_empty())
}

/// Decode a base64 payload, accepting it only if it is a PNG.
pub fn decode_png(payload: &str) -> Option<Vec<u8>> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload).ok()?;
    bytes.starts_with(PNG_MAGIC).then_some(bytes)
}

/// The caller's own stdout with any image block removed.
pub fn strip_image_block(stdout: &str) -> String {
    let mut out = Vec::new();
    let mut inside = false;
    for line in stdout.lines() {
        match line.trim() {
            IMAGE_START_MARKER => inside = true,
            IMAGE_END_MARKER => inside = false,
            _ if !inside => out.push(line),
            _ => {}
        }
    }
    out.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_payload() -> String {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(b"\x00\x00\x00\rIHDR");
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn test_wrap_embeds_source_and_markers() {
        let source = "print(\"quote's \\\"mixed\\\"\")\n";
        let wrapped = wrap_source(source);
        let encoded = base64::engine::general_purpose::STANDARD.encode(source);
        assert!(wrapped.contains(&encoded));
        assert!(wrapped.contains(IMAGE_START_MARKER));
        assert!(wrapped.contains(IMAGE_END_MARKER));
        assert!(!wrapped.contains("@@"));
    }

    #[test]
    fn test_backend_selected_before_pyplot_import() {
        let wrapped = wrap_source("");
        let use_agg = wrapped.find("matplotlib.use(\"Agg\")").unwrap();
        let pyplot = wrapped.find("import matplotlib.pyplot").unwrap();
        let user_code = wrapped.find("exec(compile(").unwrap();
        assert!(use_agg < pyplot);
        assert!(pyplot < user_code);
    }

    #[test]
    fn test_extract_payload_between_markers() {
        let stdout = format!(
            "some output\n{}\n{}\n{}\n",
            IMAGE_START_MARKER,
            png_payload(),
            IMAGE_END_MARKER
        );
        assert_eq!(extract_image_payload(&stdout), Some(png_payload()));
    }

    #[test]
    fn test_extract_joins_wrapped_payload_lines() {
        let stdout = format!("{}\nAAAA\nBBBB\n{}\n", IMAGE_START_MARKER, IMAGE_END_MARKER);
        assert_eq!(extract_image_payload(&stdout), Some("AAAABBBB".to_string()));
    }

    #[test]
    fn test_dangling_start_is_no_image() {
        let stdout = format!("{}\n{}", IMAGE_START_MARKER, png_payload());
        assert_eq!(extract_image_payload(&stdout), None);
    }

    #[test]
    fn test_end_without_start_is_no_image() {
        let stdout = format!("{}\n{}\n", png_payload(), IMAGE_END_MARKER);
        assert_eq!(extract_image_payload(&stdout), None);
    }

    #[test]
    fn test_no_markers_is_no_image() {
        assert_eq!(extract_image_payload("hello\nworld\n"), None);
        assert_eq!(
            extract_image_payload(&format!("{}\n{}\n", IMAGE_START_MARKER, IMAGE_END_MARKER)),
            None
        );
    }

    #[test]
    fn test_last_complete_block_wins() {
        let stdout = format!(
            "{s}\nFIRST\n{e}\n{s}\nSECOND\n{e}\n",
            s = IMAGE_START_MARKER,
            e = IMAGE_END_MARKER
        );
        assert_eq!(extract_image_payload(&stdout), Some("SECOND".to_string()));
    }

    #[test]
    fn test_decode_png_checks_magic() {
        assert!(decode_png(&png_payload()).is_some());
        let not_png = base64::engine::general_purpose::STANDARD.encode(b"GIF89a....");
        assert!(decode_png(&not_png).is_none());
        assert!(decode_png("***not base64***").is_none());
    }

    #[test]
    fn test_strip_image_block_keeps_user_output() {
        let stdout = format!(
            "loading data\n\n{}\nAAAA\n{}\n",
            IMAGE_START_MARKER, IMAGE_END_MARKER
        );
        assert_eq!(strip_image_block(&stdout), "loading data");
    }
}
