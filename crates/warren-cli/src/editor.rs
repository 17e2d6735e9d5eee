//! Line input for the console.
//!
//! Terminals get a readline-style editor with history and Tab completion of
//! verbs; piped input is read line by line.

use std::borrow::Cow;
use std::future;
use std::io::{self, Write};

use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::session::complete;

/// Where a session reads its commands from.
pub(crate) trait LineSource {
    /// Show `prompt` and read one raw line; `None` at end of input.
    fn read_line(
        &mut self,
        prompt: &str,
        out: &mut dyn Write,
    ) -> impl Future<Output = io::Result<Option<String>>>;

    /// Keep an executed line for later recall.
    fn remember(&mut self, line: &str);
}

pub(crate) fn bold(prompt: &str) -> String {
    format!("\x1b[1m{prompt}\x1b[0m")
}

/// Plain line reader for non-interactive input.
pub(crate) struct BufferedLines<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> BufferedLines<R> {
    pub(crate) const fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
        }
    }
}

impl<R: AsyncBufRead + Unpin> LineSource for BufferedLines<R> {
    /// Invalid UTF-8 is replaced rather than treated as an error.
    async fn read_line(
        &mut self,
        prompt: &str,
        out: &mut dyn Write,
    ) -> io::Result<Option<String>> {
        write!(out, "{}", bold(prompt))?;
        out.flush()?;

        self.buffer.clear();
        if self.reader.read_until(b'\n', &mut self.buffer).await? == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&self.buffer).into_owned()))
    }

    fn remember(&mut self, _line: &str) {}
}

/// Interactive editor with in-memory history.
///
/// Reading blocks the calling thread until the user submits a line, so it must
/// not run on a runtime worker.
pub(crate) struct LineEditor {
    editor: Editor<VerbHelper, DefaultHistory>,
}

impl LineEditor {
    pub(crate) fn new() -> rustyline::Result<Self> {
        let mut editor = Editor::<VerbHelper, DefaultHistory>::new()?;
        editor.set_helper(Some(VerbHelper));
        Ok(Self { editor })
    }

    fn read_blocking(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            // Ctrl-C at the prompt discards the line.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Io(err)) => Err(err),
            Err(err) => Err(io::Error::other(err.to_string())),
        }
    }
}

impl LineSource for LineEditor {
    fn read_line(
        &mut self,
        prompt: &str,
        _out: &mut dyn Write,
    ) -> impl Future<Output = io::Result<Option<String>>> {
        future::ready(self.read_blocking(prompt))
    }

    fn remember(&mut self, line: &str) {
        if let Err(err) = self.editor.add_history_entry(line) {
            tracing::debug!(error = %err, "failed to record history entry");
        }
    }
}

struct VerbHelper;

impl Completer for VerbHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        Ok(verb_candidates(line, pos))
    }
}

impl Hinter for VerbHelper {
    type Hint = String;
}

impl Highlighter for VerbHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        Cow::Owned(bold(prompt))
    }
}

impl Validator for VerbHelper {}

impl Helper for VerbHelper {}

/// Replacement start and candidates for the word under the cursor.
///
/// Only the leading verb completes; arguments are left alone.
fn verb_candidates(line: &str, pos: usize) -> (usize, Vec<String>) {
    let head = line.get(..pos).unwrap_or(line);
    let word = head.trim_start();
    if word.contains(char::is_whitespace) {
        return (pos, Vec::new());
    }
    let start = head.len() - word.len();
    let candidates = complete(word).into_iter().map(str::to_owned).collect();
    (start, candidates)
}
