use crate::error::Result;
use crate::form::ProductForm;
use colored::Colorize;
use std::io::{self, BufRead, Write};

/// Optional review step shown before a product is written
///
/// Mirrors the "check your input" screen: the operator sees the summary and
/// the generated workplan and either confirms or goes back to fix the input.
pub struct ReviewPrompt {
    enabled: bool,
}

impl ReviewPrompt {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Confirm on the terminal
    pub fn confirm(&self, form: &ProductForm) -> Result<bool> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.confirm_with(form, &mut stdin.lock(), &mut stdout.lock())
    }

    pub fn confirm_with<R: BufRead, W: Write>(
        &self,
        form: &ProductForm,
        input: &mut R,
        output: &mut W,
    ) -> Result<bool> {
        if !self.enabled {
            return Ok(true);
        }

        writeln!(output, "\n{} {}", "[Review]".cyan().bold(), form.summary().bold())?;
        writeln!(output, "   {}", form.description.dimmed())?;
        for (index, step) in form.build_steps().iter().enumerate() {
            writeln!(
                output,
                "   {}. {} {}",
                index + 1,
                step.function.bright_cyan(),
                step.description
            )?;
        }

        loop {
            write!(output, "{}", "Write this product to the catalog? [Y/n]: ".bold())?;
            output.flush()?;

            let mut answer = String::new();
            if input.read_line(&mut answer)? == 0 {
                writeln!(output)?;
                return Ok(false);
            }

            match answer.trim().to_lowercase().as_str() {
                "" | "y" | "yes" => return Ok(true),
                "n" | "no" => {
                    writeln!(
                        output,
                        "{}",
                        "Nothing written; adjust the input and run again.".dimmed()
                    )?;
                    return Ok(false);
                }
                _ => writeln!(output, "{}", "Please answer with y(es) or n(o).".red())?,
            }
        }
    }
}
