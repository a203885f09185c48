//! Running the shell commands of `<`, `>` and `|`.

use std::{
  io::{
    self,
    Read,
    Write,
  },
  process::{
    ChildStderr,
    ChildStdout,
    Command,
    Stdio,
  },
  thread,
  time::Instant,
};

use the_rope::Rope;
use tracing::Level;

use crate::edit::{
  EditError,
  Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pipe {
  /// `>`: the addressed text is the command's input, its output is printed.
  To,
  /// `<`: the command's output replaces the addressed text.
  From,
  /// `|`: the addressed text is filtered through the command.
  Through,
}

impl Pipe {
  fn writes_stdin(self) -> bool {
    matches!(self, Pipe::To | Pipe::Through)
  }

  fn reads_stdout(self) -> bool {
    matches!(self, Pipe::From | Pipe::Through)
  }
}

enum Stdout {
  Text(Rope),
  Print(Vec<u8>),
}

/// Runs `command` with `shell` and returns its output when the pipe reads
/// it. Standard error, and standard output for [`Pipe::To`], go to `print`.
pub(crate) fn run(
  shell: &[String],
  command: &str,
  pipe: Pipe,
  input: &Rope,
  print: &mut dyn Write,
) -> Result<Option<Rope>> {
  let (program, args) = shell.split_first().ok_or(EditError::ExpectedCommand)?;
  let start = tracing::enabled!(Level::DEBUG).then(Instant::now);
  tracing::debug!(?shell, command, ?pipe, "spawning shell command");

  let mut process = Command::new(program);
  process
    .args(args)
    .arg(command)
    .stdin(if pipe.writes_stdin() {
      Stdio::piped()
    } else {
      Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());
  let mut child = process.spawn()?;

  let stdin = child.stdin.take();
  let stdout = child.stdout.take();
  let stderr = child.stderr.take();
  // Every pipe is closed or drained by the time the scope ends, so the
  // child can always be waited for, even when printing failed.
  let (copied, output) = thread::scope(|s| {
    if let Some(mut stdin) = stdin {
      s.spawn(move || {
        if let Err(err) = input.write_to(&mut stdin) {
          tracing::warn!("failed to write input of `{command}`: {err}");
        }
      });
    }
    let reader = stdout.map(|stdout| s.spawn(move || read_stdout(stdout, pipe, command)));
    let copied = match stderr {
      Some(mut stderr) => copy_stderr(&mut stderr, print),
      None => Ok(()),
    };
    let output = reader
      .map(|reader| {
        reader
          .join()
          .unwrap_or_else(|_| Err(io::Error::other("stdout reader panicked")))
      })
      .transpose();
    (copied, output)
  });
  let status = child.wait()?;
  copied?;
  let output = output?;

  if let Some(start) = start {
    tracing::debug!(command, %status, elapsed = ?start.elapsed(), "shell command finished");
  }
  let text = match output {
    Some(Stdout::Text(text)) => Some(text),
    Some(Stdout::Print(bytes)) => {
      print.write_all(&bytes)?;
      None
    },
    None => None,
  };
  if !status.success() {
    return Err(EditError::Exit(status));
  }
  Ok(text)
}

/// Copies `stderr` to `print`. Once `print` fails the rest is discarded so
/// that the command is not left blocked on a full pipe.
fn copy_stderr(stderr: &mut ChildStderr, print: &mut dyn Write) -> io::Result<()> {
  if let Err(err) = io::copy(&mut *stderr, print) {
    io::copy(stderr, &mut io::sink())?;
    return Err(err);
  }
  Ok(())
}

fn read_stdout(mut stdout: ChildStdout, pipe: Pipe, command: &str) -> io::Result<Stdout> {
  if !pipe.reads_stdout() {
    let mut bytes = Vec::new();
    stdout.read_to_end(&mut bytes)?;
    return Ok(Stdout::Print(bytes));
  }
  match Rope::read_from(stdout) {
    Ok(text) => Ok(Stdout::Text(text)),
    Err(err) => {
      tracing::warn!("output of `{command}` is incomplete: {}", err.source);
      Ok(Stdout::Text(err.partial))
    },
  }
}
