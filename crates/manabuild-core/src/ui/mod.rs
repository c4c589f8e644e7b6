//! Terminal output shared by the build steps.
//!
//! All user-facing output goes through one [`Console`]: a writer behind a
//! single mutex. The spinner thread only draws while holding that mutex, so
//! any code that prints through the console can never interleave with a
//! redraw.

pub mod spinner;
pub mod theme;

use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossterm::QueueableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::terminal::{Clear, ClearType};

pub use spinner::Spinner;
pub use theme::Theme;

type Sink = Box<dyn Write + Send>;

/// Shared, mutex-guarded output stream.
#[derive(Clone)]
pub struct Console {
    sink: Arc<Mutex<Sink>>,
    terminal: bool,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("terminal", &self.terminal)
            .finish_non_exhaustive()
    }
}

impl Console {
    /// Console writing to `writer`. `terminal` enables colours, line
    /// clearing and the animated spinner.
    pub fn new(writer: impl Write + Send + 'static, terminal: bool) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
            terminal,
        }
    }

    /// Console on stderr, animated when stderr is a terminal.
    pub fn stderr() -> Self {
        let terminal = io::stderr().is_terminal();
        Self::new(io::stderr(), terminal)
    }

    /// Plain console capturing everything into memory.
    pub fn capture() -> (Self, CaptureBuffer) {
        let buffer = CaptureBuffer::default();
        (Self::new(buffer.clone(), false), buffer)
    }

    /// Whether the sink is an interactive terminal
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Take exclusive access to the sink. The spinner cannot redraw while
    /// the guard is alive.
    pub fn lock(&self) -> MutexGuard<'_, Sink> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Style `text` for the console; plain text when not on a terminal.
    pub fn paint(&self, text: &str, color: crossterm::style::Color) -> String {
        if self.terminal {
            use crossterm::style::Stylize;
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    /// Write one line, holding the lock for the whole write.
    pub fn line(&self, text: &str) {
        let mut out = self.lock();
        if self.terminal {
            clear_line(&mut **out).ok();
        }
        writeln!(out, "{text}").ok();
        out.flush().ok();
    }
}

/// Move to column 0 and erase the current line.
///
/// # Errors
///
/// Propagates write errors from the underlying sink.
pub fn clear_line(out: &mut dyn Write) -> io::Result<()> {
    out.queue(MoveToColumn(0))?;
    out.queue(Clear(ClearType::CurrentLine))?;
    Ok(())
}

/// In-memory console sink, readable after the fact.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::style::Color;

    #[test]
    fn test_capture_console() {
        let (console, buffer) = Console::capture();
        console.line("hello");
        console.line("world");
        assert_eq!(buffer.contents(), "hello\nworld\n");
        assert!(!console.is_terminal());
    }

    #[test]
    fn test_paint_plain_without_terminal() {
        let (console, _) = Console::capture();
        assert_eq!(console.paint("ok", Color::Green), "ok");

        let styled = Console::new(CaptureBuffer::default(), true);
        let painted = styled.paint("ok", Color::Green);
        assert!(painted.contains("ok"));
        assert_ne!(painted, "ok");
    }
}
