//! Interactive input.
//!
//! The workflow only talks to a [`Prompter`]. [`TerminalPrompter`] reads from the controlling
//! terminal; [`ScriptedPrompter`] replays canned answers.

use adduser_core::{Error, Result};
use dialoguer::{Input, Select};
use regex::Regex;
use secrecy::SecretString;
use std::collections::VecDeque;
use tracing::debug;

/// Source of operator answers.
pub trait Prompter {
    /// Reads one line of free text.
    fn ask_text(&mut self, prompt: &str) -> Result<String>;

    /// Reads a secret without echo.
    fn ask_masked(&mut self, prompt: &str) -> Result<SecretString>;

    /// Reads text until the trimmed answer matches `pattern`, then returns it trimmed.
    fn ask_validated(&mut self, prompt: &str, pattern: &Regex) -> Result<String> {
        loop {
            let answer = self.ask_text(prompt)?;
            let answer = answer.trim();
            if pattern.is_match(answer) {
                return Ok(answer.to_string());
            }
            debug!(prompt, answer, "answer rejected");
        }
    }

    /// Picks one of `options` and returns its index. `default` is pre-selected.
    fn choose_one(
        &mut self,
        prompt: &str,
        options: &[String],
        default: Option<usize>,
    ) -> Result<usize>;

    /// Displays a message.
    fn show(&mut self, message: &str) -> Result<()>;
}

/// Prompter on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    /// Creates a terminal prompter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn ask_text(&mut self, prompt: &str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_err)
    }

    fn ask_masked(&mut self, prompt: &str) -> Result<SecretString> {
        let secret = rpassword::prompt_password(format!("{prompt}: "))?;
        Ok(SecretString::from(secret))
    }

    fn choose_one(
        &mut self,
        prompt: &str,
        options: &[String],
        default: Option<usize>,
    ) -> Result<usize> {
        Select::new()
            .with_prompt(prompt)
            .items(options)
            .default(default.unwrap_or(0))
            .interact()
            .map_err(prompt_err)
    }

    fn show(&mut self, message: &str) -> Result<()> {
        println!("{message}");
        Ok(())
    }
}

fn prompt_err(err: dialoguer::Error) -> Error {
    Error::PromptError(err.to_string())
}

/// Prompter replaying a fixed list of answers.
///
/// Every `ask_*` and `choose_one` call consumes the next answer. `choose_one` expects the text of
/// the chosen option, or an empty answer to take the default. Running out of answers is a
/// [`Error::PromptError`].
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<String>,
    shown: Vec<String>,
}

impl ScriptedPrompter {
    /// Creates a prompter that answers with `answers` in order.
    #[must_use]
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Prompts asked so far, in order.
    #[must_use]
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    /// Messages shown so far, in order.
    #[must_use]
    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    /// Answers not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next_answer(&mut self, prompt: &str) -> Result<String> {
        self.asked.push(prompt.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| Error::PromptError(format!("no scripted answer for `{prompt}`")))
    }
}

impl Prompter for ScriptedPrompter {
    fn ask_text(&mut self, prompt: &str) -> Result<String> {
        self.next_answer(prompt)
    }

    fn ask_masked(&mut self, prompt: &str) -> Result<SecretString> {
        self.next_answer(prompt).map(SecretString::from)
    }

    fn choose_one(
        &mut self,
        prompt: &str,
        options: &[String],
        default: Option<usize>,
    ) -> Result<usize> {
        let answer = self.next_answer(prompt)?;
        if answer.is_empty() {
            return default
                .ok_or_else(|| Error::PromptError(format!("no default for `{prompt}`")));
        }
        options
            .iter()
            .position(|option| *option == answer)
            .ok_or_else(|| Error::PromptError(format!("`{answer}` is not an option")))
    }

    fn show(&mut self, message: &str) -> Result<()> {
        self.shown.push(message.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn validated_prompt_repeats_until_match() {
        let digits = Regex::new(r"^\d+$").unwrap();
        let mut prompter = ScriptedPrompter::new(["staff", "", " 100 "]);

        let answer = prompter.ask_validated("Default Group", &digits).unwrap();
        assert_eq!(answer, "100");
        assert_eq!(prompter.asked().len(), 3);
    }

    #[test]
    fn exhausted_script_is_prompt_error() {
        let digits = Regex::new(r"^\d+$").unwrap();
        let mut prompter = ScriptedPrompter::new(["x"]);
        let err = prompter.ask_validated("Default Group", &digits).unwrap_err();
        assert!(matches!(err, Error::PromptError(_)));
    }

    #[test]
    fn choice_by_text_or_default() {
        let shells = vec!["/bin/sh".to_string(), "/bin/bash".to_string()];
        let mut prompter = ScriptedPrompter::new(["/bin/sh", "", "/bin/csh"]);

        assert_eq!(prompter.choose_one("Shell", &shells, Some(1)).unwrap(), 0);
        assert_eq!(prompter.choose_one("Shell", &shells, Some(1)).unwrap(), 1);
        assert!(prompter.choose_one("Shell", &shells, Some(1)).is_err());
    }

    #[test]
    fn masked_answers_and_messages_are_recorded() {
        let mut prompter = ScriptedPrompter::new(["secret"]);
        let secret = prompter.ask_masked("New Password").unwrap();
        prompter.show("hello").unwrap();

        assert_eq!(secret.expose_secret(), "secret");
        assert_eq!(prompter.asked(), ["New Password"]);
        assert_eq!(prompter.shown(), ["hello"]);
        assert_eq!(prompter.remaining(), 0);
    }
}
