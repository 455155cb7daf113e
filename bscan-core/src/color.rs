//! Terminal color escape helpers.
//!
//! `bscan` treats terminal color formatting as a boundary service; this
//! module is its concrete, dependency-free implementation — no external
//! crate for a handful of ANSI codes.

const RESET: &str = "\x1b[0m";

fn wrap(code: &str, s: &str) -> String {
    format!("{code}{s}{RESET}")
}

pub fn red(s: &str) -> String {
    wrap("\x1b[31m", s)
}

pub fn purple(s: &str) -> String {
    wrap("\x1b[35m", s)
}

pub fn blue(s: &str) -> String {
    wrap("\x1b[36m", s)
}

pub fn yellow(s: &str) -> String {
    wrap("\x1b[33m", s)
}
