//! Asking the user before a command touches their machine.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::Mutex;

/// What the user chose at a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// `y`: go ahead
    Run,
    /// `n`: abort the command loop
    Decline,
    /// `p`: show the code, then ask again
    Print,
    /// `x`: open the file with the system opener, then ask again
    Open,
}

impl Decision {
    /// Read a decision from the first character of an answer.
    pub fn from_answer(answer: &str) -> Option<Self> {
        match answer.trim().chars().next()?.to_ascii_lowercase() {
            'y' => Some(Decision::Run),
            'n' => Some(Decision::Decline),
            'p' => Some(Decision::Print),
            'x' => Some(Decision::Open),
            _ => None,
        }
    }
}

pub trait Confirm: Send + Sync {
    /// Show `question` and return the answer, or `None` when it was not
    /// understood (the caller asks again).
    fn ask(&self, question: &str) -> Option<Decision>;
}

/// Prompts on stdout and reads a line from stdin.
///
/// A closed stdin counts as declining.
#[derive(Debug, Default)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn ask(&self, question: &str) -> Option<Decision> {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(question.as_bytes());
        let _ = stdout.flush();

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => Some(Decision::Decline),
            Ok(_) => Decision::from_answer(&answer),
        }
    }
}

/// Answers from a fixed script; declines once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Every question shown so far.
    pub fn questions(&self) -> Vec<String> {
        self.asked.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl Confirm for ScriptedConfirm {
    fn ask(&self, question: &str) -> Option<Decision> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(question.to_string());
        }
        let answer = self.answers.lock().ok()?.pop_front();
        match answer {
            Some(answer) => Decision::from_answer(&answer),
            None => Some(Decision::Decline),
        }
    }
}
