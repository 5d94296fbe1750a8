use std::io::{self, Write};

use termcolor::{Color, ColorSpec, WriteColor};

use crate::error::SorrelError;

#[derive(Default)]
pub struct Styles {
    header: ColorSpec,
    context: ColorSpec,
}

impl Styles {
    pub fn new() -> Styles {
        Styles {
            header: ColorSpec::new()
                .set_fg(Some(Color::Red))
                .set_bold(true)
                .set_intense(true)
                .clone(),
            context: ColorSpec::new().set_fg(Some(Color::Blue)).clone(),
        }
    }
}

/// Writes diagnostics to any [`WriteColor`] sink, coloring the
/// headline and leaving source excerpts plain.
pub struct Renderer<'writer> {
    pub writer: &'writer mut dyn WriteColor,
    styles: Styles,
}

impl<'writer> Renderer<'writer> {
    pub fn new(writer: &'writer mut dyn WriteColor) -> Renderer<'writer> {
        Renderer {
            writer,
            styles: Styles::new(),
        }
    }

    pub fn render(&mut self, error: &SorrelError) -> io::Result<()> {
        match error {
            SorrelError::Compile(errors) => {
                for error in errors {
                    self.render_lines(&error.to_string())?;
                }
                Ok(())
            }
            SorrelError::Runtime(trace) => {
                self.writer.set_color(&self.styles.header)?;
                writeln!(self.writer, "{}", trace.message)?;
                self.writer.reset()?;
                for call in &trace.calls {
                    self.writer.set_color(&self.styles.context)?;
                    writeln!(self.writer, "{}", call)?;
                }
                self.writer.reset()
            }
            SorrelError::Io(message) => {
                self.writer.set_color(&self.styles.header)?;
                write!(self.writer, "error")?;
                self.writer.reset()?;
                writeln!(self.writer, ": {}", message)
            }
        }
    }

    /// The first line of a diagnostic is the headline; the rest is
    /// source context.
    fn render_lines(&mut self, text: &str) -> io::Result<()> {
        for (index, line) in text.lines().enumerate() {
            if index == 0 {
                self.writer.set_color(&self.styles.header)?;
                writeln!(self.writer, "{}", line)?;
                self.writer.reset()?;
            } else {
                writeln!(self.writer, "{}", line)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::NoColor;

    #[test]
    fn renders_runtime_trace() {
        let mut trace = crate::vm::Trace::new("Operand must be a number.");
        trace.calls.push("[./main:1:7] in script".to_string());

        let mut buffer = NoColor::new(Vec::new());
        Renderer::new(&mut buffer)
            .render(&SorrelError::Runtime(trace))
            .unwrap();

        let text = String::from_utf8(buffer.into_inner()).unwrap();
        assert_eq!(text, "Operand must be a number.\n[./main:1:7] in script\n");
    }
}
