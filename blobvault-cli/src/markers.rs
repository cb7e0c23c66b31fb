//! Styled status markers for console output
//!
//! Windows consoles get ASCII fallbacks.

use console::{style, StyledObject};

#[cfg(windows)]
const DONE: &str = "[OK]";
#[cfg(not(windows))]
const DONE: &str = "\u{2713}";

#[cfg(windows)]
const CAUTION: &str = "[!]";
#[cfg(not(windows))]
const CAUTION: &str = "!";

/// Prefix for secrets printed once
#[cfg(windows)]
pub const KEY: &str = "[K]";
#[cfg(not(windows))]
pub const KEY: &str = "\u{1F511}";

pub fn done() -> StyledObject<&'static str> {
    style(DONE).green()
}

pub fn caution() -> StyledObject<&'static str> {
    style(CAUTION).yellow()
}
