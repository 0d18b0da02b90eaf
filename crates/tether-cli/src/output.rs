//! Colored terminal output.
//!
//! Respects `NO_COLOR` and the `--color` flag.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tether_engine::Reply;

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Styled output writer for terminal.
pub struct StyledOutput {
    stdout: StandardStream,
    stderr: StandardStream,
}

impl StyledOutput {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
            stderr: StandardStream::stderr(choice),
        }
    }

    fn styled(stream: &mut StandardStream, text: &str, color: Option<Color>, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        let _ = stream.set_color(&spec);
        let _ = writeln!(stream, "{}", text);
        let _ = stream.reset();
    }

    /// Result value, plain on stdout.
    pub fn value(&mut self, text: &str) {
        let _ = writeln!(self.stdout, "{}", text);
    }

    /// Green bold line.
    pub fn success(&mut self, text: &str) {
        Self::styled(&mut self.stdout, text, Some(Color::Green), true);
    }

    /// Cyan line.
    pub fn info(&mut self, text: &str) {
        Self::styled(&mut self.stdout, text, Some(Color::Cyan), false);
    }

    /// Red bold line on stderr.
    pub fn error(&mut self, text: &str) {
        Self::styled(&mut self.stderr, text, Some(Color::Red), true);
    }

    /// Print a reply; returns whether it succeeded.
    pub fn reply(&mut self, reply: &Reply) -> bool {
        match &reply.error {
            None => {
                self.value(&reply.value);
                true
            }
            Some(error) => {
                self.error(&format!("error: {}", error));
                false
            }
        }
    }

    pub fn flush(&mut self) {
        let _ = self.stdout.flush();
        let _ = self.stderr.flush();
    }
}
