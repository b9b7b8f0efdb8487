//! Runner executor: spawn, stream, wait, classify.

use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use super::config::RunConfiguration;
use super::output::{OutputSink, OutputStream};
use super::process::{ChildProcess, ProcessLauncher, TokioLauncher};
use super::result::{ExecutionResult, VIOLATIONS_EXIT_CODE};
use crate::error::ExecutionError;

/// Runs PHP CodeSniffer as a child process.
pub struct Runner {
    launcher: Arc<dyn ProcessLauncher>,
}

impl Runner {
    /// Creates a runner spawning real processes.
    pub fn new() -> Self {
        Self::with_launcher(Arc::new(TokioLauncher))
    }

    /// Creates a runner with a custom launcher.
    pub fn with_launcher(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self { launcher }
    }

    /// Runs the tool once, relaying every output line to `sink`.
    ///
    /// Exit codes 0 and 1 produce a result; see
    /// [`ExecutionResult::outcome`]. Every other exit is an error.
    pub async fn run(
        &self,
        config: &RunConfiguration,
        sink: &mut dyn OutputSink,
    ) -> Result<ExecutionResult, ExecutionError> {
        info!("PHP CodeSniffer is stored at {}", config.tool_path.display());
        info!("Running checks against {}", config.source_path.display());
        if let Some(ref ruleset) = config.ruleset {
            info!("Selected standard is {}", ruleset);
        }
        info!("Memory limit is {}", config.memory_limit);

        let argv = config.command_line();
        info!("Final command to run {}", argv.join(" "));

        let start = Instant::now();
        let child = self
            .launcher
            .spawn(&argv)
            .map_err(|source| ExecutionError::SpawnFailed {
                program: argv[0].clone(),
                source,
            })?;

        let collected = drain_and_wait(child, sink);
        let (exit, stdout_lines, stderr_lines) = match config.timeout {
            // Dropping the collector drops the child, which kills it.
            Some(limit) => tokio::time::timeout(limit, collected)
                .await
                .map_err(|_| ExecutionError::Timeout(limit))??,
            None => collected.await?,
        };

        let duration = start.elapsed();
        let code = exit.ok_or(ExecutionError::Terminated)?;
        debug!(
            "PHP CodeSniffer exited with code {} after {:?} ({} stdout lines, {} stderr lines)",
            code,
            duration,
            stdout_lines.len(),
            stderr_lines.len()
        );

        match code {
            0 | VIOLATIONS_EXIT_CODE => Ok(ExecutionResult::new(
                code,
                stdout_lines,
                stderr_lines,
                duration,
            )),
            other => Err(ExecutionError::UnexpectedExit { code: other }),
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

type Collected = (Option<i32>, Vec<String>, Vec<String>);

/// Reads both pipes concurrently until EOF, then waits for the exit code.
async fn drain_and_wait(
    child: ChildProcess,
    sink: &mut dyn OutputSink,
) -> Result<Collected, ExecutionError> {
    let ChildProcess {
        stdout,
        stderr,
        exit,
    } = child;

    let mut stdout_lines = BufReader::new(stdout).split(b'\n');
    let mut stderr_lines = BufReader::new(stderr).split(b'\n');
    let mut stdout_open = true;
    let mut stderr_open = true;

    let mut out = Vec::new();
    let mut err = Vec::new();

    while stdout_open || stderr_open {
        tokio::select! {
            segment = stdout_lines.next_segment(), if stdout_open => match segment? {
                Some(bytes) => {
                    let line = decode_line(&bytes);
                    sink.line(OutputStream::Stdout, &line);
                    out.push(line);
                }
                None => stdout_open = false,
            },
            segment = stderr_lines.next_segment(), if stderr_open => match segment? {
                Some(bytes) => {
                    let line = decode_line(&bytes);
                    sink.line(OutputStream::Stderr, &line);
                    err.push(line);
                }
                None => stderr_open = false,
            },
        }
    }

    let code = exit.await?;
    Ok((code, out, err))
}

fn decode_line(bytes: &[u8]) -> String {
    let line = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::output::BufferSink;
    use crate::runner::result::Outcome;
    use std::io;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::time::Duration;

    enum FakeExit {
        Code(i32),
        Signal,
        Hang,
    }

    struct FakeLauncher {
        stdout: String,
        stderr: String,
        exit: FakeExit,
        fail_spawn: bool,
        spawned: Mutex<Vec<Vec<String>>>,
    }

    impl FakeLauncher {
        fn new(stdout: &str, stderr: &str, exit: FakeExit) -> Arc<Self> {
            Arc::new(Self {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                exit,
                fail_spawn: false,
                spawned: Mutex::new(Vec::new()),
            })
        }

        fn unlaunchable() -> Arc<Self> {
            Arc::new(Self {
                stdout: String::new(),
                stderr: String::new(),
                exit: FakeExit::Code(0),
                fail_spawn: true,
                spawned: Mutex::new(Vec::new()),
            })
        }
    }

    impl ProcessLauncher for FakeLauncher {
        fn spawn(&self, argv: &[String]) -> io::Result<ChildProcess> {
            self.spawned.lock().unwrap().push(argv.to_vec());
            if self.fail_spawn {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such file"));
            }
            let exit: futures::future::BoxFuture<'static, io::Result<Option<i32>>> = match self.exit {
                FakeExit::Code(code) => Box::pin(async move { Ok::<_, io::Error>(Some(code)) }),
                FakeExit::Signal => Box::pin(async { Ok::<_, io::Error>(None) }),
                FakeExit::Hang => Box::pin(futures::future::pending()),
            };
            Ok(ChildProcess {
                stdout: Box::new(Cursor::new(self.stdout.clone().into_bytes())),
                stderr: Box::new(Cursor::new(self.stderr.clone().into_bytes())),
                exit,
            })
        }
    }

    fn config() -> RunConfiguration {
        RunConfiguration::new("/opt/tool", "/usr/bin/php", "/src")
            .unwrap()
            .with_ruleset("PSR2")
    }

    #[tokio::test]
    async fn test_exit_zero_passes() {
        let launcher = FakeLauncher::new("ok\n", "", FakeExit::Code(0));
        let runner = Runner::with_launcher(launcher.clone());
        let mut sink = BufferSink::new();

        let result = runner.run(&config(), &mut sink).await.unwrap();

        assert_eq!(result.outcome(), Outcome::Passed);
        assert_eq!(result.stdout_lines, vec!["ok"]);
        assert_eq!(
            launcher.spawned.lock().unwrap()[0],
            config().command_line()
        );
    }

    #[tokio::test]
    async fn test_exit_one_is_violations_not_error() {
        let report = "FILE: /src/a.php\n 3 | ERROR | Missing doc comment\n";
        let runner = Runner::with_launcher(FakeLauncher::new(report, "", FakeExit::Code(1)));
        let mut sink = BufferSink::new();

        let result = runner.run(&config(), &mut sink).await.unwrap();

        assert_eq!(result.exit_code, 1);
        assert_eq!(result.outcome(), Outcome::ViolationsFound);
        assert_eq!(result.stdout_lines.len(), 2);
    }

    #[tokio::test]
    async fn test_other_exit_code_is_error() {
        let runner = Runner::with_launcher(FakeLauncher::new("", "boom\n", FakeExit::Code(2)));
        let mut sink = BufferSink::new();

        let err = runner.run(&config(), &mut sink).await.unwrap_err();

        assert!(matches!(err, ExecutionError::UnexpectedExit { code: 2 }));
        assert_eq!(sink.stream(OutputStream::Stderr), vec!["boom"]);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error() {
        let runner = Runner::with_launcher(FakeLauncher::unlaunchable());
        let mut sink = BufferSink::new();

        let err = runner.run(&config(), &mut sink).await.unwrap_err();

        assert!(matches!(err, ExecutionError::SpawnFailed { ref program, .. } if program == "/usr/bin/php"));
        assert!(sink.lines.is_empty());
    }

    #[tokio::test]
    async fn test_signal_is_terminated() {
        let runner = Runner::with_launcher(FakeLauncher::new("", "", FakeExit::Signal));
        let mut sink = BufferSink::new();

        let err = runner.run(&config(), &mut sink).await.unwrap_err();

        assert!(matches!(err, ExecutionError::Terminated));
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = Runner::with_launcher(FakeLauncher::new("partial\n", "", FakeExit::Hang));
        let mut sink = BufferSink::new();
        let config = config().with_timeout(Duration::from_millis(50));

        let err = runner.run(&config, &mut sink).await.unwrap_err();

        assert!(matches!(err, ExecutionError::Timeout(d) if d == Duration::from_millis(50)));
        assert_eq!(sink.stream(OutputStream::Stdout), vec!["partial"]);
    }

    #[tokio::test]
    async fn test_all_lines_delivered_in_order() {
        let stdout: String = (0..500).map(|i| format!("line {i}\n")).collect();
        let stderr: String = (0..200).map(|i| format!("warn {i}\r\n")).collect();
        let runner = Runner::with_launcher(FakeLauncher::new(&stdout, &stderr, FakeExit::Code(0)));
        let mut sink = BufferSink::new();

        let result = runner.run(&config(), &mut sink).await.unwrap();

        let expected: Vec<String> = (0..500).map(|i| format!("line {i}")).collect();
        assert_eq!(sink.stream(OutputStream::Stdout), expected);
        assert_eq!(result.stdout_lines, expected);
        assert_eq!(result.stderr_lines.len(), 200);
        assert_eq!(result.stderr_lines[199], "warn 199");
    }

    #[tokio::test]
    async fn test_final_line_without_newline() {
        let runner = Runner::with_launcher(FakeLauncher::new("a\nb", "", FakeExit::Code(0)));
        let mut sink = BufferSink::new();

        let result = runner.run(&config(), &mut sink).await.unwrap();

        assert_eq!(result.stdout_lines, vec!["a", "b"]);
    }

    #[test]
    fn test_decode_line_is_lossy() {
        assert_eq!(decode_line(b"caf\xff\r"), "caf\u{fffd}");
    }
}
