use std::fmt;
use std::io::{self, Write};

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::crossterm::terminal::{disable_raw_mode, enable_raw_mode};

const MASKED_INPUT_PROMPT: &str = "Enter your access token (press F2 to reveal last 4 chars): ";
const REVEALED_TAIL: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationChoice {
    Yes,
    No,
    Cancel,
}

#[derive(Debug, Clone)]
pub struct UiError {
    message: String,
}

impl UiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for UiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UiError {}

impl From<io::Error> for UiError {
    fn from(err: io::Error) -> Self {
        UiError::new(err.to_string())
    }
}

/// Edit state for a masked single-line prompt.
#[derive(Debug, Default)]
struct MaskedLine {
    text: String,
    reveal_tail: bool,
}

enum MaskedStep {
    Continue,
    Submit,
    Cancel,
}

impl MaskedLine {
    fn apply(&mut self, code: KeyCode, modifiers: KeyModifiers) -> MaskedStep {
        match code {
            KeyCode::Enter => MaskedStep::Submit,
            KeyCode::Esc => MaskedStep::Cancel,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => MaskedStep::Cancel,
            KeyCode::F(2) => {
                self.reveal_tail = !self.reveal_tail;
                MaskedStep::Continue
            }
            KeyCode::Backspace => {
                self.text.pop();
                MaskedStep::Continue
            }
            KeyCode::Char(c) => {
                self.text.push(c);
                MaskedStep::Continue
            }
            _ => MaskedStep::Continue,
        }
    }

    fn display(&self) -> String {
        let count = self.text.chars().count();
        if !self.reveal_tail || count <= REVEALED_TAIL {
            return "*".repeat(count);
        }
        let tail: String = self.text.chars().skip(count - REVEALED_TAIL).collect();
        format!("{}{}", "*".repeat(count - REVEALED_TAIL), tail)
    }
}

/// Read a token without echoing it.
pub fn prompt_masked_input() -> Result<String, UiError> {
    print!("{MASKED_INPUT_PROMPT}");
    io::stdout().flush()?;
    enable_raw_mode()?;
    let result = read_masked();
    disable_raw_mode()?;
    println!();
    result
}

fn read_masked() -> Result<String, UiError> {
    let mut line = MaskedLine::default();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match line.apply(key.code, key.modifiers) {
            MaskedStep::Submit => return Ok(line.text.trim().to_string()),
            MaskedStep::Cancel => return Err(UiError::new("Cancelled")),
            MaskedStep::Continue => {
                print!("\r\x1b[2K{MASKED_INPUT_PROMPT}{}", line.display());
                io::stdout().flush()?;
            }
        }
    }
}

pub fn prompt_confirmation(question: &str) -> Result<ConfirmationChoice, UiError> {
    print!("{question}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    parse_confirmation(&answer)
}

pub fn parse_confirmation(input: &str) -> Result<ConfirmationChoice, UiError> {
    let trimmed = input.trim().to_lowercase();
    if trimmed.is_empty() {
        return Ok(ConfirmationChoice::No);
    }
    match trimmed.as_str() {
        "y" | "yes" => Ok(ConfirmationChoice::Yes),
        "n" | "no" => Ok(ConfirmationChoice::No),
        "c" | "cancel" => Ok(ConfirmationChoice::Cancel),
        _ => Err(UiError::new("Invalid confirmation response")),
    }
}
