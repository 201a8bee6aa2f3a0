//! Console output sink for the command pipeline.

/// Receives the text produced by a command.
pub trait Console {
    /// Writes regular output, such as a key or a validation result.
    fn write(&mut self, text: &str);

    /// Writes an error report line.
    fn error(&mut self, text: &str);

    /// Writes a progress message; only called in verbose mode.
    fn verbose(&mut self, text: &str) {
        self.write(text);
    }
}

/// Output settings shared by all commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Emit progress messages
    pub verbose: bool,
}

/// [`Console`] that records every line, for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MemoryConsole {
    /// Regular output lines
    pub output: Vec<String>,
    /// Error lines
    pub errors: Vec<String>,
    /// Progress lines
    pub progress: Vec<String>,
}

impl Console for MemoryConsole {
    fn write(&mut self, text: &str) {
        self.output.push(text.to_string());
    }

    fn error(&mut self, text: &str) {
        self.errors.push(text.to_string());
    }

    fn verbose(&mut self, text: &str) {
        self.progress.push(text.to_string());
    }
}

/// Routes pipeline messages to a console according to the options.
pub(crate) struct Reporter<'a, C: Console + ?Sized> {
    console: &'a mut C,
    options: OutputOptions,
}

impl<'a, C: Console + ?Sized> Reporter<'a, C> {
    pub(crate) fn new(console: &'a mut C, options: OutputOptions) -> Self {
        Self { console, options }
    }

    pub(crate) fn write(&mut self, text: &str) {
        self.console.write(text);
    }

    pub(crate) fn error(&mut self, text: &str) {
        self.console.error(text);
    }

    pub(crate) fn verbose(&mut self, text: impl AsRef<str>) {
        if self.options.verbose {
            self.console.verbose(text.as_ref());
        }
    }
}
