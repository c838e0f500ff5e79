use regex::Regex;
use tracing::debug;

/// Which extraction format matched the AI response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionFormat {
    /// `<CODE>...</CODE>` XML-style tags
    XmlTags,
    /// Fence tagged with the expected language
    MarkdownFence,
    /// Untagged fence or bare text recognized by its content
    Heuristic,
}

#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub code: String,
    pub format: ExtractionFormat,
}

const MERMAID_HEADERS: &[&str] = &["pie", "xychart-beta", "gantt", "%%{init"];

/// Extract Python plotting code from an AI response using a 3-tier cascade:
///
/// 1. `<CODE>...</CODE>` XML tags (case-insensitive)
/// 2. `` ```python ... ``` `` markdown fence
/// 3. Any `` ``` `` block that imports or uses matplotlib
pub fn extract_python_code(response: &str) -> Option<ExtractionOutcome> {
    let outcome = try_xml_tags(response)
        .or_else(|| try_tagged_fence(response, "python"))
        .or_else(|| try_heuristic(response, looks_like_plotting_code));
    if outcome.is_none() {
        debug!(chars = response.len(), "no python code block in response");
    }
    outcome
}

/// Returns just the code string.
pub fn extract_code(response: &str) -> Option<String> {
    extract_python_code(response).map(|o| o.code)
}

/// Mermaid markup from a ```` ```mermaid ```` fence, an untagged fence, or a
/// response that is nothing but a diagram.
pub fn extract_mermaid(response: &str) -> Option<ExtractionOutcome> {
    if let Some(outcome) = try_tagged_fence(response, "mermaid") {
        return Some(outcome);
    }
    if let Some(outcome) = try_heuristic(response, looks_like_mermaid) {
        return Some(outcome);
    }
    let trimmed = response.trim();
    looks_like_mermaid(trimmed).then(|| ExtractionOutcome {
        code: trimmed.to_string(),
        format: ExtractionFormat::Heuristic,
    })
}

/// First JSON object in the response: a ```` ```json ```` fence if present,
/// otherwise the first balanced `{...}` span.
pub fn extract_json_object(response: &str) -> Option<String> {
    if let Some(outcome) = try_tagged_fence(response, "json") {
        if outcome.code.starts_with('{') {
            return Some(outcome.code);
        }
    }
    first_balanced_object(response).map(str::to_string)
}

fn try_xml_tags(response: &str) -> Option<ExtractionOutcome> {
    let re = Regex::new(r"(?si)<CODE>([\s\S]*?)</CODE>").ok()?;
    let cap = re.captures(response)?;
    let code = cap[1].trim().to_string();
    if code.is_empty() {
        return None;
    }
    Some(ExtractionOutcome {
        code,
        format: ExtractionFormat::XmlTags,
    })
}

fn try_tagged_fence(response: &str, language: &str) -> Option<ExtractionOutcome> {
    let pattern = format!(r"(?i)```{}[ \t]*\r?\n([\s\S]*?)```", regex::escape(language));
    let re = Regex::new(&pattern).ok()?;
    let code = re
        .captures_iter(response)
        .map(|cap| cap[1].trim().to_string())
        .find(|code| !code.is_empty())?;
    Some(ExtractionOutcome {
        code,
        format: ExtractionFormat::MarkdownFence,
    })
}

fn try_heuristic(response: &str, accept: fn(&str) -> bool) -> Option<ExtractionOutcome> {
    let re = Regex::new(r"```\w*[ \t]*\r?\n([\s\S]*?)```").ok()?;
    let code = re
        .captures_iter(response)
        .map(|cap| cap[1].trim().to_string())
        .find(|code| !code.is_empty() && accept(code))?;
    Some(ExtractionOutcome {
        code,
        format: ExtractionFormat::Heuristic,
    })
}

fn looks_like_plotting_code(code: &str) -> bool {
    code.contains("import matplotlib") || code.contains("plt.")
}

fn looks_like_mermaid(code: &str) -> bool {
    let first = code.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    MERMAID_HEADERS.iter().any(|h| first.starts_with(h))
}

/// Scan for the first `{` and return through its matching `}`, skipping
/// braces inside JSON strings.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
