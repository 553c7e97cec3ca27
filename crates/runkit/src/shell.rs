//! Shell text helpers.

/// Quote a string for safe inclusion in a POSIX shell command line.
///
/// The result is always single-quoted; embedded single quotes are closed,
/// escaped and reopened (`'\''`).
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Split raw process output into lines, dropping empty ones.
pub(crate) fn split_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
