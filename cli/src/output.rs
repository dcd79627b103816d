use crate::error::Result;
use console::style;
use contact_vault::Prompter;
use serde::Serialize;
use std::collections::VecDeque;
use std::io::{self, IsTerminal, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

pub struct OutputManager {
    format: OutputFormat,
    colored: bool,
}

impl OutputManager {
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self {
            format,
            colored,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print a serializable view as JSON, or as aligned key/value rows
    pub fn print_view<T: Serialize>(&self, title: &str, view: &T) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(view)?);
            }
            OutputFormat::Table => {
                if self.colored {
                    println!("{}", style(title).bold().underlined());
                } else {
                    println!("{}", title);
                }

                let value = serde_json::to_value(view)?;
                if let serde_json::Value::Object(map) = value {
                    let width = map.keys().map(|k| k.len()).max().unwrap_or(0);
                    for (key, value) in map {
                        let rendered = match value {
                            serde_json::Value::String(s) => s,
                            serde_json::Value::Null => "-".to_string(),
                            other => other.to_string(),
                        };
                        self.print_key_value(&format!("{:width$}", key, width = width), &rendered)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn print_key_value(&self, key: &str, value: &str) -> Result<()> {
        if self.colored {
            println!("  {}  {}", style(key).bold().blue(), style(value).green());
        } else {
            println!("  {}  {}", key, value);
        }
        Ok(())
    }

    pub fn print_success(&self, message: &str) -> Result<()> {
        if self.colored {
            println!("{} {}", style("✓").green().bold(), message);
        } else {
            println!("✓ {}", message);
        }
        Ok(())
    }

    pub fn print_warning(&self, message: &str) -> Result<()> {
        if self.colored {
            println!("{} {}", style("⚠").yellow().bold(), message);
        } else {
            println!("⚠ {}", message);
        }
        Ok(())
    }

    pub fn print_error(&self, message: &str) -> Result<()> {
        if self.colored {
            eprintln!("{} {}", style("✗").red().bold(), message);
        } else {
            eprintln!("✗ {}", message);
        }
        Ok(())
    }

    pub fn print_info(&self, message: &str) -> Result<()> {
        if self.colored {
            println!("{} {}", style("ℹ").blue().bold(), message);
        } else {
            println!("ℹ {}", message);
        }
        Ok(())
    }

    /// `None` on end of input
    pub fn prompt_input(&self, message: &str) -> Result<Option<String>> {
        print!("{}: ", message);
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }

        Ok(Some(input.trim().to_string()))
    }

    pub fn prompt_confirm(&self, message: &str) -> Result<bool> {
        let answer = self.prompt_input(&format!("{} [y/N]", message))?;
        Ok(matches!(
            answer.map(|a| a.to_lowercase()).as_deref(),
            Some("y") | Some("yes")
        ))
    }

    /// Hidden input on a terminal, a plain line otherwise
    pub fn prompt_password(&self, message: &str) -> Result<Option<String>> {
        if io::stdin().is_terminal() {
            let password = rpassword::prompt_password(format!("{}: ", message))?;
            return Ok(Some(password));
        }

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Drives the vault's host operations from the terminal
pub struct TerminalPrompter<'a> {
    output: &'a OutputManager,
    answers: VecDeque<String>,
    assume_yes: bool,
}

impl<'a> TerminalPrompter<'a> {
    pub fn new(output: &'a OutputManager) -> Self {
        Self {
            output,
            answers: VecDeque::new(),
            assume_yes: false,
        }
    }

    /// Answer the next text prompts from these values before asking
    pub fn with_answers<I: IntoIterator<Item = String>>(mut self, answers: I) -> Self {
        self.answers.extend(answers);
        self
    }

    pub fn assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }
}

impl Prompter for TerminalPrompter<'_> {
    fn request_text(&mut self, prompt: &str) -> Option<String> {
        if let Some(answer) = self.answers.pop_front() {
            return Some(answer);
        }

        self.output.prompt_input(prompt).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read input");
            None
        })
    }

    fn request_secret(&mut self, prompt: &str) -> Option<String> {
        if let Some(answer) = self.answers.pop_front() {
            return Some(answer);
        }

        self.output.prompt_password(prompt).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read secret input");
            None
        })
    }

    fn ask_yes_no(&mut self, question: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        self.output.prompt_confirm(question).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read confirmation");
            false
        })
    }

    fn show_message(&mut self, message: &str) {
        let _ = self.output.print_success(message);
    }

    fn show_error(&mut self, message: &str) {
        let _ = self.output.print_error(message);
    }
}
