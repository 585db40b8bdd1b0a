//! Error rendering with source context
//!
//! Template-level errors print the offending line inside a small window of
//! surrounding lines, with a caret marker under the error column.

use unicode_width::UnicodeWidthStr;

use crate::template::Position;

/// Context lines shown above and below the error line
const WINDOW_ABOVE: usize = 2;
const WINDOW_BELOW: usize = 1;

/// Render `error_msg` at `position` inside `source`, marking `marker_len`
/// characters under the error column.
fn render(source: &str, position: Position, error_msg: &str, marker_len: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let error_idx = position.line.saturating_sub(1);
    let window_start = error_idx.saturating_sub(WINDOW_ABOVE);
    let window_end = lines.len().min(error_idx + WINDOW_BELOW + 1);
    let gutter = window_end.to_string().len();

    let mut out = format!("Error at {position}:\n  {error_msg}\n\n");
    for (idx, line) in lines
        .iter()
        .enumerate()
        .take(window_end)
        .skip(window_start)
    {
        out.push_str(&format!(" {:gutter$} | {line}\n", idx + 1));
        if idx == error_idx {
            // the quoted line sits after a ` N | ` prefix of gutter + 4
            // columns; pad by display width so the marker lands under wide
            // glyphs too
            let before_error: String = line
                .chars()
                .take(position.column.saturating_sub(1))
                .collect();
            out.push_str(&" ".repeat(gutter + 4 + before_error.width()));
            out.push_str(&"^".repeat(marker_len.max(1)));
            out.push('\n');
        }
    }
    out
}

/// Format a template error, highlighting the expression when one is known
pub(crate) fn format_template_error(
    source: &str,
    position: Position,
    error_msg: &str,
    expression: Option<&str>,
) -> String {
    let rendered = render(
        source,
        position,
        error_msg,
        expression.map_or(1, str::len),
    );
    match expression {
        Some(expr) => format!("{rendered}\nExpression: {expr}"),
        None => rendered,
    }
}
