//! Interactive line prompts.
//!
//! Uses cliclack with a custom theme. Everything is drawn on stderr; stdout
//! belongs to the server once it is launched.

use std::io::IsTerminal;

use cliclack::{Theme, ThemeState, set_theme};
use console::Style;

use crate::error::{PakError, PakResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A source of single-line answers.
pub trait LinePrompt {
    /// Ask a question and return the trimmed answer. An empty string means
    /// the user just pressed enter.
    fn read_line(&mut self, prompt: &str, sensitive: bool) -> PakResult<String>;
}

/// Prompt backed by the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

/// Custom theme for pak prompts.
pub struct PakTheme;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl TerminalPrompt {
    /// Create a terminal prompt and install the theme.
    pub fn new() -> Self {
        init_theme();
        Self
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl LinePrompt for TerminalPrompt {
    fn read_line(&mut self, prompt: &str, sensitive: bool) -> PakResult<String> {
        let answer: String = if sensitive {
            map_cancelled(cliclack::password(prompt).allow_empty().interact())?
        } else {
            map_cancelled(cliclack::input(prompt).required(false).interact())?
        };
        Ok(answer.trim().to_string())
    }
}

impl Theme for PakTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().cyan(),
            ThemeState::Error(_) => Style::new().red(),
            _ => Style::new().dim(),
        }
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active | ThemeState::Submit => Style::new().cyan(),
            ThemeState::Error(_) => Style::new().red(),
            _ => Style::new().dim(),
        }
    }

    fn input_style(&self, _state: &ThemeState) -> Style {
        Style::new()
    }

    fn placeholder_style(&self, _state: &ThemeState) -> Style {
        Style::new().dim()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Install the cliclack theme.
pub fn init_theme() {
    set_theme(PakTheme);
}

/// Whether stdin is attached to a terminal.
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Whether a "save?" answer means yes. Anything but `n`/`no` counts.
pub fn is_affirmative(answer: &str) -> bool {
    !matches!(answer.trim().to_lowercase().as_str(), "n" | "no")
}

/// Convert IO interrupted errors to Cancelled for clean exit on ESC.
fn map_cancelled<T>(result: Result<T, std::io::Error>) -> PakResult<T> {
    result.map_err(|e| {
        if e.kind() == std::io::ErrorKind::Interrupted {
            PakError::Cancelled
        } else {
            PakError::Io(e)
        }
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
