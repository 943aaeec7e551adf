// UI layer: credential prompts. The username is read with `dialoguer`; the
// password is either read silently by `dialoguer::Password` or, when a
// replace character is configured, echoed as that character using a small
// raw-mode reader built on `crossterm`.

use std::io::{self, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use dialoguer::{Input, Password};

use crate::config::UploadOptions;
use crate::error::CmsError;

pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Where the run coordinator gets its login from.
pub trait CredentialSource {
    fn credentials(&self, options: &UploadOptions) -> Result<Credentials, CmsError>;
}

/// Interactive terminal prompt.
pub struct TerminalPrompt;

impl CredentialSource for TerminalPrompt {
    fn credentials(&self, options: &UploadOptions) -> Result<Credentials, CmsError> {
        let username: String = Input::new()
            .with_prompt(dialoguer_prompt(&options.username_prompt))
            .interact_text()
            .map_err(prompt_error)?;

        let password = if options.password_replace_char.is_empty() {
            // `Password` hides input entirely.
            Password::new()
                .with_prompt(dialoguer_prompt(&options.password_prompt))
                .interact()
                .map_err(prompt_error)?
        } else {
            read_masked(&options.password_prompt, &options.password_replace_char)
                .map_err(prompt_error)?
        };

        Ok(Credentials { username, password })
    }
}

/// Fixed credentials, e.g. from the environment or from tests.
pub struct StaticCredentials {
    pub username: String,
    pub password: String,
}

impl CredentialSource for StaticCredentials {
    fn credentials(&self, _options: &UploadOptions) -> Result<Credentials, CmsError> {
        Ok(Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }
}

// dialoguer adds its own ": " suffix
fn dialoguer_prompt(prompt: &str) -> String {
    prompt.trim_end().trim_end_matches(':').to_string()
}

fn prompt_error(e: impl std::fmt::Display) -> CmsError {
    CmsError::Auth(format!("could not read credentials: {}", e))
}

/// What a keystroke did to the masked line.
#[derive(Debug, PartialEq, Eq)]
enum MaskStep {
    Echo,
    Erase,
    Ignore,
    Submit,
    Cancel,
}

#[derive(Default)]
struct MaskedLine {
    value: String,
}

impl MaskedLine {
    fn apply(&mut self, code: KeyCode, modifiers: KeyModifiers) -> MaskStep {
        match code {
            KeyCode::Enter => MaskStep::Submit,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => MaskStep::Cancel,
            KeyCode::Char(c) => {
                self.value.push(c);
                MaskStep::Echo
            }
            KeyCode::Backspace => match self.value.pop() {
                Some(_) => MaskStep::Erase,
                None => MaskStep::Ignore,
            },
            _ => MaskStep::Ignore,
        }
    }
}

fn read_masked(prompt: &str, mask: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;

    terminal::enable_raw_mode()?;
    let result = read_masked_raw(&mut stdout, mask);
    terminal::disable_raw_mode()?;
    writeln!(stdout)?;
    result
}

fn read_masked_raw(out: &mut impl Write, mask: &str) -> io::Result<String> {
    let width = mask.chars().count();
    let mut line = MaskedLine::default();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        match line.apply(key.code, key.modifiers) {
            MaskStep::Echo => write!(out, "{}", mask)?,
            MaskStep::Erase => write!(out, "{}", "\u{8} \u{8}".repeat(width))?,
            MaskStep::Ignore => {}
            MaskStep::Submit => return Ok(line.value),
            MaskStep::Cancel => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "password prompt cancelled"))
            }
        }
        out.flush()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_line_editing() {
        let mut line = MaskedLine::default();
        assert_eq!(line.apply(KeyCode::Char('p'), KeyModifiers::NONE), MaskStep::Echo);
        assert_eq!(line.apply(KeyCode::Char('w'), KeyModifiers::NONE), MaskStep::Echo);
        assert_eq!(line.apply(KeyCode::Backspace, KeyModifiers::NONE), MaskStep::Erase);
        assert_eq!(line.apply(KeyCode::Char('x'), KeyModifiers::NONE), MaskStep::Echo);
        assert_eq!(line.apply(KeyCode::Left, KeyModifiers::NONE), MaskStep::Ignore);
        assert_eq!(line.apply(KeyCode::Enter, KeyModifiers::NONE), MaskStep::Submit);
        assert_eq!(line.value, "px");
    }

    #[test]
    fn test_backspace_on_empty_line_is_ignored() {
        let mut line = MaskedLine::default();
        assert_eq!(line.apply(KeyCode::Backspace, KeyModifiers::NONE), MaskStep::Ignore);
        assert_eq!(line.apply(KeyCode::Char('c'), KeyModifiers::CONTROL), MaskStep::Cancel);
        assert!(line.value.is_empty());
    }

    #[test]
    fn test_dialoguer_prompt_strips_colon() {
        assert_eq!(dialoguer_prompt("Username: "), "Username");
        assert_eq!(dialoguer_prompt("Login"), "Login");
    }
}
