//! Pattern highlighter.
//!
//! One compiled regex alternation, built from the packaged `patterns.txt`
//! plus any `--patterns` supplied on the command line.

use bscan_core::purple;
use regex::Regex;

/// Rewrites `line` with every match of `patterns` wrapped in the `purple()`
/// ANSI helper, and logs it as an info line prefixed with `target` when at
/// least one match was found. Lines without a match are not re-emitted —
/// the external tool already wrote them to its own output file.
pub fn highlight_line(patterns: &Regex, target: &str, line: &str) {
    if !patterns.is_match(line) {
        return;
    }

    let mut rewritten = String::with_capacity(line.len());
    let mut last = 0;
    for m in patterns.find_iter(line) {
        rewritten.push_str(&line[last..m.start()]);
        rewritten.push_str(&purple(m.as_str()));
        last = m.end();
    }
    rewritten.push_str(&line[last..]);

    log::info!("[{target}] {rewritten}");
}
