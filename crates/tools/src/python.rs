//! Python execution command.
//!
//! Watches replies for fenced ```` ```python ```` blocks, writes the code to
//! the scripts directory, asks the user, and feeds the interpreter's output
//! back to the bot.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command as Process;
use tracing::{debug, info, warn};
use wigli_agent::OutputSink;
use wigli_config::PythonConfig;
use wigli_core::command::{Command, CommandArgs, CommandHandler};
use wigli_core::error::{CommandError, InjectionError};
use wigli_core::injection::Injection;
use wigli_core::message::{Message, Role};
use wigli_core::text::plural;

use crate::confirm::{Confirm, Decision};

pub const PYTHON_KEYWORD: &str = "```python";

/// Name the script is shown under in interpreter output.
const DISPLAY_NAME: &str = "pyscript.py";

/// Runs fenced Python blocks after the user agrees.
pub struct PythonRunner {
    scripts_dir: PathBuf,
    interpreter: String,
    script_name: String,
    confirm: Arc<dyn Confirm>,
    output: Arc<dyn OutputSink>,
}

impl PythonRunner {
    pub fn new(
        scripts_dir: impl Into<PathBuf>,
        config: &PythonConfig,
        confirm: Arc<dyn Confirm>,
        output: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            interpreter: config.interpreter.clone(),
            script_name: config.script_name.clone(),
            confirm,
            output,
        }
    }

    pub fn script_path(&self) -> PathBuf {
        self.scripts_dir.join(&self.script_name)
    }

    /// Ask until the user runs or declines. Returns `false` on decline.
    async fn confirm(&self, script: &str, path: &Path) -> bool {
        let lines = script.matches('\n').count();
        let question = format!(
            "Wigli wants to execute {lines} {} of python code. Will you allow Wigli to execute this code?\n\
             ([Y]es/[N]o/[P]rint the code/Open with e[X]plorer)\n: ",
            plural("line", lines)
        );
        loop {
            match self.confirm.ask(&question) {
                Some(Decision::Run) => return true,
                Some(Decision::Decline) => return false,
                Some(Decision::Print) => self.output.emit(&format!("\n{script}\n\n")),
                Some(Decision::Open) => open_with_system(path).await,
                None => {}
            }
        }
    }
}

/// Hand a file to the platform's default opener. Failures are only logged.
async fn open_with_system(path: &Path) {
    let opener = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    if let Err(e) = Process::new(opener).arg(path).status().await {
        warn!(opener, path = %path.display(), "Could not open script: {e}");
    }
}

/// Concatenate every fenced block in `reply`.
///
/// The reply is split on triple backticks (after folding the ```` ```python ````
/// fence into a plain one); the odd-numbered segments are code.
pub fn extract_code(reply: &str) -> String {
    reply
        .replace(PYTHON_KEYWORD, "```")
        .split("```")
        .skip(1)
        .step_by(2)
        .collect()
}

#[async_trait]
impl CommandHandler for PythonRunner {
    fn parse(&self, reply: &str) -> Option<CommandArgs> {
        let code = extract_code(reply);
        (!code.trim().is_empty()).then(|| CommandArgs::new(code))
    }

    async fn run(&self, args: CommandArgs) -> Result<Vec<Message>, CommandError> {
        let mut script = format!("{}\n", args.input.trim());
        let path = self.script_path();

        tokio::fs::create_dir_all(&self.scripts_dir).await?;
        tokio::fs::write(&path, &script).await?;
        debug!(path = %path.display(), "Wrote script");

        if !self.confirm(&script, &path).await {
            info!("User declined to run the script");
            return Ok(vec![Message::quit()]);
        }

        // The user may have edited the file while deciding.
        let edited = tokio::fs::read_to_string(&path).await?;
        if !edited.is_empty() {
            script = edited;
        }

        info!(interpreter = %self.interpreter, lines = script.matches('\n').count(), "Running script");
        let output = Process::new(&self.interpreter)
            .arg(&path)
            .output()
            .await
            .map_err(|e| CommandError::ExecutionFailed {
                command: "run_python".into(),
                reason: format!("{}: {e}", self.interpreter),
            })?;

        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
        .replace(&self.script_name, DISPLAY_NAME);

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!(exit_code = code, "Script exited with an error");
        }

        self.output.emit_line(&text);
        Ok(vec![Message::system(text)])
    }
}

fn python_injection() -> Injection {
    Injection::new([
        (
            Role::System,
            "You are a very advanced assistant with expert-level knowledge of Python programming, \
             and a Python interpreter at your fingertips! A parser is now running which will extract \
             any code formatted in Python markdown style (```python\\n<your_code>\\n```) and ask if \
             you want to run it. Simply surround your code with \"```python\" and \"```\", say yes to \
             the confirmation, and your code will be written to a .py file and executed with a \
             Python 3 interpreter! You use this tool creatively to perform tasks for the user. Your \
             code is always self-explaining or well-commented, and you always prefer to use type \
             hints and Sphinx docstrings. In addition, you know that all code has bugs the first \
             time, and you build this assumption into your code. You always put lots of print \
             statements in your code to tell stdout what's going on. The interpreter and parser \
             have been enabled! Go ahead and verify that it's working! Feel free to explain your \
             reasoning afterward.",
        ),
        (
            Role::Assistant,
            "```python\n# Print \"Hello, world!\" to verify code execution\nprint(\"Hello, world!\")\n```\n",
        ),
        (Role::System, "```\nHello, world!\n```\n"),
        (
            Role::Assistant,
            "This code prints \"Hello, world!\" which is a classic way of verifying code execution. \
             Since the resulting message was \"Hello, world!\" the interpreter seems to be working.",
        ),
        (
            Role::System,
            "Excellent work. You are being transferred to the user now.",
        ),
    ])
}

/// The `run_python` command: keyword, priming injection and runner.
pub fn python_command(runner: PythonRunner) -> Result<Command, InjectionError> {
    Command::new(PYTHON_KEYWORD, python_injection(), Arc::new(runner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::ScriptedConfirm;
    use wigli_agent::BufferSink;

    fn runner(dir: &Path, interpreter: &str, answers: &[&str]) -> (PythonRunner, Arc<BufferSink>) {
        let sink = Arc::new(BufferSink::new());
        let config = PythonConfig {
            interpreter: interpreter.into(),
            script_name: "wigli_script.py".into(),
        };
        let runner = PythonRunner::new(
            dir,
            &config,
            Arc::new(ScriptedConfirm::new(answers.iter().copied())),
            sink.clone(),
        );
        (runner, sink)
    }

    #[test]
    fn extracts_odd_segments() {
        let reply = "Try this:\n```python\nprint(1)\n```\nand\n```\nprint(2)\n```\ndone";
        assert_eq!(extract_code(reply), "\nprint(1)\n\nprint(2)\n");
    }

    #[test]
    fn parse_skips_empty_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, _) = runner(dir.path(), "python3", &[]);
        assert!(runner.parse("```python\n```").is_none());
        assert!(runner.parse("```python\nx = 1\n```").is_some());
    }

    #[tokio::test]
    async fn decline_returns_quit() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, _) = runner(dir.path(), "python3", &["n"]);
        let out = runner.run(CommandArgs::new("print('hi')")).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].role, Role::Quit);
        let written = std::fs::read_to_string(runner.script_path()).unwrap();
        assert_eq!(written, "print('hi')\n");
    }

    #[tokio::test]
    async fn print_then_decline_shows_code() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, sink) = runner(dir.path(), "python3", &["p", "?", "n"]);
        let out = runner.run(CommandArgs::new("x = 41 + 1")).await.unwrap();
        assert_eq!(out[0].role, Role::Quit);
        assert!(sink.contents().contains("x = 41 + 1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_interpreter_and_renames_script() {
        let dir = tempfile::tempdir().unwrap();
        // `cat` stands in for the interpreter: it echoes the script back.
        let (runner, sink) = runner(dir.path(), "cat", &["y"]);
        let out = runner
            .run(CommandArgs::new("print('wigli_script.py says hi')"))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].role, Role::System);
        assert_eq!(out[0].content, "print('pyscript.py says hi')\n");
        assert!(sink.contents().contains("pyscript.py says hi"));
    }

    #[tokio::test]
    async fn missing_interpreter_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, _) = runner(dir.path(), "definitely-not-an-interpreter-xyz", &["y"]);
        let err = runner.run(CommandArgs::new("print(1)")).await.unwrap_err();
        assert!(err.to_string().contains("run_python"));
    }

    #[test]
    fn command_uses_fence_keyword() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, _) = runner(dir.path(), "python3", &[]);
        let command = python_command(runner).unwrap();
        assert_eq!(command.keyword(), "```python");
        assert_eq!(command.injection().injection_messages.len(), 5);
    }
}
