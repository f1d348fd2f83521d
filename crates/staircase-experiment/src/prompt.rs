//! Terminal interaction: line prompts and the interactive judgment source.

use std::io::{BufRead, Write};
use std::str::FromStr;

use anyhow::{Context, Result};
use staircase_kernel::judgment::{Choice, Judgment, JudgmentRequest, JudgmentSource};
use staircase_kernel::trial::format_value;

/// Line-oriented prompts over any reader/writer pair.
///
/// Every `ask*` method returns `Ok(None)` when the operator enters `q` or the
/// input ends.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Consume the prompter, returning the output sink.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Write a line to the operator.
    pub fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{}", text).context("failed to write to terminal")
    }

    /// Read one trimmed line. `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("failed to read from terminal")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn show(&mut self, prompt: &str) -> Result<()> {
        write!(self.output, "{}", prompt).context("failed to write to terminal")?;
        self.output.flush().context("failed to flush terminal")
    }

    /// Free-form answer.
    pub fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        self.show(&format!("{}: ", prompt))?;
        match self.read_line()? {
            Some(line) if line.eq_ignore_ascii_case("q") => Ok(None),
            other => Ok(other),
        }
    }

    /// One of `options`, matched case-insensitively and returned as listed.
    pub fn ask_choice<'a>(&mut self, prompt: &str, options: &[&'a str]) -> Result<Option<&'a str>> {
        loop {
            self.show(&format!("{} [{}]: ", prompt, options.join("/")))?;
            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            if line.eq_ignore_ascii_case("q") {
                return Ok(None);
            }
            if let Some(option) = options.iter().find(|o| o.eq_ignore_ascii_case(&line)) {
                return Ok(Some(*option));
            }
            self.say("Please enter a valid option")?;
        }
    }

    /// A value parsed as `T`, re-asking until it parses.
    pub fn ask_number<T: FromStr>(&mut self, prompt: &str) -> Result<Option<T>> {
        loop {
            let Some(line) = self.ask(prompt)? else {
                return Ok(None);
            };
            match line.parse() {
                Ok(value) => return Ok(Some(value)),
                Err(_) => self.say("Please enter a numeric value")?,
            }
        }
    }
}

/// Asks the operator which of two presented values the subject chose.
pub struct TerminalJudgments<R, W> {
    prompter: Prompter<R, W>,
}

impl<R: BufRead, W: Write> TerminalJudgments<R, W> {
    pub fn new(prompter: Prompter<R, W>) -> Self {
        Self { prompter }
    }

    pub fn into_prompter(self) -> Prompter<R, W> {
        self.prompter
    }

    fn present(&mut self, request: &JudgmentRequest) -> Result<()> {
        let heading = if request.is_backtrack {
            format!(
                "\nBacktracked Test for {} - Test {}\n",
                request.staircase, request.trial_number
            )
        } else {
            format!("\nTest for {} - Test {}\n", request.staircase, request.trial_number)
        };
        self.prompter.say(&heading)?;
        let presentation = &request.presentation;
        self.prompter.say(&format!(
            "Option 1: {} {}",
            format_value(presentation.first()),
            request.units
        ))?;
        self.prompter.say(&format!(
            "Option 2: {} {}",
            format_value(presentation.second()),
            request.units
        ))
    }
}

impl<R: BufRead, W: Write> JudgmentSource for TerminalJudgments<R, W> {
    fn judge(&mut self, request: &JudgmentRequest) -> Result<Judgment> {
        self.present(request)?;
        loop {
            self.prompter
                .show(&format!("\nWhich was {} [1/2]: ", request.comparison))?;
            let Some(line) = self.prompter.read_line()? else {
                return Ok(Judgment::Cancel);
            };
            match line.to_lowercase().as_str() {
                "q" => return Ok(Judgment::Cancel),
                "<" if request.allow_backtrack => return Ok(Judgment::Backtrack),
                "1" => return Ok(Judgment::Selected(Choice::First)),
                "2" => return Ok(Judgment::Selected(Choice::Second)),
                _ => self.prompter.say("Invalid Choice")?,
            }
        }
    }
}
