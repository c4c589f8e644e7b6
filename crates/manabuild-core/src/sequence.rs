//! Strictly sequential, titled build steps.
//!
//! Each [`OperationSequence::run`] call is one numbered step: a header is
//! printed, a spinner runs while the action executes, and the step ends with
//! either a success mark or a failure mark. The first failing step moves the
//! sequence into a terminal failed state; the error itself travels back to
//! the caller, which reports it through [`OperationSequence::fail`].

use std::fmt;
use std::future::Future;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use crate::ui::{Console, Spinner, Theme, clear_line};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Finished,
    Failed,
}

#[derive(Debug)]
struct State {
    phase: Phase,
    index: usize,
}

/// Runs titled steps one after the other with progress output.
#[derive(Debug)]
pub struct OperationSequence {
    console: Console,
    theme: Theme,
    state: Mutex<State>,
}

/// Handle given to a running step for console output.
#[derive(Debug, Clone)]
pub struct StepContext {
    console: Console,
    theme: Theme,
    index: usize,
}

impl StepContext {
    /// Number of the running step, starting at 1
    pub fn index(&self) -> usize {
        self.index
    }

    /// Run `f` with exclusive access to the console. The spinner line is
    /// cleared first and the spinner cannot redraw until `f` returns, which
    /// also makes this the place to run commands that stream to the terminal.
    pub fn with_paused_output<R>(&self, f: impl FnOnce(&mut dyn Write) -> R) -> R {
        let mut out = self.console.lock();
        if self.console.is_terminal() {
            clear_line(&mut **out).ok();
        }
        let result = f(&mut **out);
        out.flush().ok();
        result
    }

    /// Print one line without racing the spinner.
    pub fn println(&self, text: impl AsRef<str>) {
        self.with_paused_output(|out| {
            writeln!(out, "{}", text.as_ref()).ok();
        });
    }

    /// Print a highlighted warning line.
    pub fn warn(&self, text: impl AsRef<str>) {
        let line = format!("{} {}", self.theme.warning_icon, text.as_ref());
        self.println(self.console.paint(&line, self.theme.warning));
    }

    /// Print a dimmed detail line.
    pub fn detail(&self, text: impl AsRef<str>) {
        self.println(self.console.paint(text.as_ref(), self.theme.secondary));
    }
}

impl OperationSequence {
    /// Sequence printing to `console`.
    pub fn new(console: Console) -> Self {
        Self {
            console,
            theme: Theme::default(),
            state: Mutex::new(State {
                phase: Phase::Idle,
                index: 0,
            }),
        }
    }

    /// Sequence on stderr, animated when stderr is a terminal.
    pub fn stderr() -> Self {
        Self::new(Console::stderr())
    }

    /// The console steps print to
    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Number of steps started so far
    pub fn steps_run(&self) -> usize {
        self.state().index
    }

    /// Whether a step has failed
    pub fn has_failed(&self) -> bool {
        self.state().phase == Phase::Failed
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one step.
    ///
    /// # Errors
    ///
    /// Returns whatever error `action` returns; the sequence is then failed
    /// and accepts no further steps.
    ///
    /// # Panics
    ///
    /// Panics when called after [`finish`](Self::finish), after a failed
    /// step, or from inside another step.
    pub async fn run<T, E, F, Fut>(&self, title: &str, action: F) -> Result<T, E>
    where
        F: FnOnce(StepContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let index = {
            let mut state = self.state();
            match state.phase {
                Phase::Idle => {}
                Phase::Running => panic!("step `{title}` started while another step is running"),
                Phase::Finished | Phase::Failed => {
                    panic!("step `{title}` started after the sequence ended")
                }
            }
            state.phase = Phase::Running;
            state.index += 1;
            state.index
        };

        tracing::debug!(index, title, "step started");
        let header = format!("=== [{index}] {title} ===");
        self.console
            .line(&self.console.paint(&header, self.theme.header));

        let ctx = StepContext {
            console: self.console.clone(),
            theme: self.theme.clone(),
            index,
        };
        let spinner = Spinner::start(&self.console, title);
        let result = action(ctx).await;
        spinner.stop();

        let mut state = self.state();
        match &result {
            Ok(_) => {
                state.phase = Phase::Idle;
                let mark = format!("{} done", self.theme.success_icon);
                self.console
                    .line(&self.console.paint(&mark, self.theme.success));
            }
            Err(_) => {
                state.phase = Phase::Failed;
                tracing::debug!(index, title, "step failed");
                let mark = format!("{} failed", self.theme.error_icon);
                self.console
                    .line(&self.console.paint(&mark, self.theme.error));
            }
        }
        result
    }

    /// Close the sequence after the last step.
    ///
    /// # Panics
    ///
    /// Panics when a step is still running.
    pub fn finish(&self) {
        let mut state = self.state();
        assert!(
            state.phase != Phase::Running,
            "sequence finished while a step is running"
        );
        if state.phase == Phase::Idle {
            state.phase = Phase::Finished;
        }
    }

    /// Report a terminal failure: the diagnostic becomes the last thing on
    /// the console and the sequence accepts no further steps.
    pub fn fail(&self, diagnostic: &dyn fmt::Display) {
        self.state().phase = Phase::Failed;
        let text = format!("{} {diagnostic}", self.theme.error_icon);
        self.console
            .line(&self.console.paint(&text, self.theme.error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::CaptureBuffer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sequence() -> (OperationSequence, CaptureBuffer) {
        let (console, buffer) = Console::capture();
        (OperationSequence::new(console), buffer)
    }

    #[tokio::test]
    async fn test_steps_are_numbered() {
        let (seq, buffer) = sequence();
        let a: Result<u32, String> = seq.run("first", |_| async { Ok(1) }).await;
        let b: Result<u32, String> = seq
            .run("second", |ctx| async move {
                ctx.println("inside");
                Ok(ctx.index() as u32)
            })
            .await;
        seq.finish();

        assert_eq!(a, Ok(1));
        assert_eq!(b, Ok(2));
        assert_eq!(
            buffer.contents(),
            "=== [1] first ===\n✓ done\n=== [2] second ===\ninside\n✓ done\n"
        );
    }

    #[tokio::test]
    async fn test_failure_stops_following_steps() {
        let (seq, buffer) = sequence();
        let ran = AtomicUsize::new(0);

        let result = async {
            seq.run("resolve", |_| async {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await?;
            seq.run("configure", |_| async {
                ran.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("configure exited with code 1".to_string())
            })
            .await?;
            seq.run("build", |_| async {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await
        }
        .await;

        let err = result.unwrap_err();
        seq.fail(&err);

        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert!(seq.has_failed());
        assert_eq!(seq.steps_run(), 2);
        let out = buffer.contents();
        assert!(!out.contains("build"));
        assert!(out.ends_with("✗ configure exited with code 1\n"), "{out}");
    }

    #[tokio::test]
    #[should_panic(expected = "after the sequence ended")]
    async fn test_run_after_finish_panics() {
        let (seq, _) = sequence();
        seq.finish();
        let _ = seq.run("late", |_| async { Ok::<_, String>(()) }).await;
    }

    #[tokio::test]
    #[should_panic(expected = "after the sequence ended")]
    async fn test_run_after_failure_panics() {
        let (seq, _) = sequence();
        let _ = seq
            .run("broken", |_| async { Err::<(), _>("boom") })
            .await;
        let _ = seq.run("late", |_| async { Ok::<_, &str>(()) }).await;
    }

    #[tokio::test]
    async fn test_paused_output_holds_console() {
        let (seq, buffer) = sequence();
        seq.run("test", |ctx| async move {
            ctx.with_paused_output(|out| {
                writeln!(out, "ok  \tpkg\t0.01s")?;
                writeln!(out, "PASS")
            })
        })
        .await
        .unwrap();
        assert!(buffer.contents().contains("ok  \tpkg\t0.01s\nPASS\n"));
    }
}
