use std::io::{self, BufRead, Stdout, StdinLock, Write};

/// The person at the keyboard.
///
/// Every confirmation in the tool accepts exactly `y`; anything else, including an
/// empty line or a read failure, is a refusal.
pub trait Operator {
    /// Show `prompt` and return true only if the operator answers `y`
    fn confirm(&mut self, prompt: &str) -> bool;

    /// Replace the current transient status line (countdowns). An empty line clears it.
    fn status(&mut self, line: &str);

    /// Wait until the operator presses enter
    fn acknowledge(&mut self);
}

/// [`Operator`] over a line-oriented reader and a terminal writer
pub struct ConsoleOperator<R, W> {
    input: R,
    output: W,
    status_width: usize,
}

impl ConsoleOperator<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            status_width: 0,
        }
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn prompt(&mut self, text: &str) -> io::Result<String> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;
        self.read_line()
    }

    #[cfg(test)]
    fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn confirm(&mut self, prompt: &str) -> bool {
        match self.prompt(prompt) {
            Ok(answer) => {
                tracing::debug!("{}{}", prompt, answer);
                answer == "y"
            }
            Err(e) => {
                tracing::warn!("Failed to read operator input: {}", e);
                false
            }
        }
    }

    fn status(&mut self, line: &str) {
        let result = write!(self.output, "\r{:width$}\r{}", "", line, width = self.status_width)
            .and_then(|_| self.output.flush());
        if let Err(e) = result {
            tracing::debug!("Failed to write status line: {}", e);
        }
        self.status_width = line.len();
    }

    fn acknowledge(&mut self) {
        if let Err(e) = self.prompt("Press enter to continue...") {
            tracing::debug!("Failed to read operator input: {}", e);
        }
    }
}
