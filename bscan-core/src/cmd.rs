//! Command-string display helpers.

/// Truncates `cmd` to at most `width` characters, preserving its leading
/// prefix and appending a trailing ellipsis when truncation occurs.
///
/// A command that already fits is returned unchanged, otherwise it is cut
/// short enough that the ellipsis still fits within `width`.
pub fn truncate_cmd(cmd: &str, width: usize) -> String {
    if cmd.chars().count() <= width {
        return cmd.to_string();
    }

    let keep = width.saturating_sub(3);
    let prefix: String = cmd.chars().take(keep).collect();
    format!("{prefix}...")
}
