//! Terminal capability probing.
//!
//! Detection runs once, the first time the crossterm surface enters raw mode. The only
//! capability consulted today is the kitty keyboard protocol: when present the surface asks
//! for disambiguated escape codes, which is what makes keypad keys (`KeypadDelete`,
//! `KeypadLeft`, ...) distinguishable from the main block.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct TerminalCapabilities {
    pub keyboard_enhancement: bool,
}

impl TerminalCapabilities {
    /// Query the attached terminal. Must be called while raw mode is enabled.
    pub fn detect() -> Self {
        let keyboard_enhancement = match crossterm::terminal::supports_keyboard_enhancement() {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(target: "terminal", error = %e, "keyboard_enhancement_query_failed");
                false
            }
        };
        tracing::info!(target: "terminal", keyboard_enhancement, "capabilities_detected");
        Self {
            keyboard_enhancement,
        }
    }

    /// Capabilities of a terminal that reports nothing beyond the legacy key encoding.
    pub const fn legacy() -> Self {
        Self {
            keyboard_enhancement: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_has_no_enhancement() {
        assert!(!TerminalCapabilities::legacy().keyboard_enhancement);
        assert_eq!(TerminalCapabilities::default(), TerminalCapabilities::legacy());
    }
}
