//! Scripted stand-ins for the interactive collaborators.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::process::{ExitStatus, Output};
use std::sync::Mutex;

use anyhow::{Result, bail};

use crate::command_runner::CommandRunner;
use crate::open::Opener;
use crate::prompt::Prompt;

/// Answers prompts from queues and fails when a queue runs dry.
#[derive(Default)]
pub struct ScriptedPrompt {
    pub inputs: RefCell<VecDeque<String>>,
    pub passwords: RefCell<VecDeque<String>>,
    pub selections: RefCell<VecDeque<usize>>,
    pub confirmations: RefCell<VecDeque<bool>>,
    pub asked: RefCell<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn with_inputs(self, inputs: &[&str]) -> Self {
        self.inputs
            .borrow_mut()
            .extend(inputs.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_passwords(self, passwords: &[&str]) -> Self {
        self.passwords
            .borrow_mut()
            .extend(passwords.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_selection(self, index: usize) -> Self {
        self.selections.borrow_mut().push_back(index);
        self
    }

    pub fn with_confirmation(self, answer: bool) -> Self {
        self.confirmations.borrow_mut().push_back(answer);
        self
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    fn next<T>(&self, queue: &RefCell<VecDeque<T>>, msg: &str) -> io::Result<T> {
        self.asked.borrow_mut().push(msg.to_string());
        queue
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, format!("unexpected prompt: {msg}")))
    }
}

impl Prompt for ScriptedPrompt {
    fn input(&self, msg: &str) -> io::Result<String> {
        self.next(&self.inputs, msg)
    }

    fn password(&self, msg: &str) -> io::Result<String> {
        self.next(&self.passwords, msg)
    }

    fn select(&self, msg: &str, _labels: &[String]) -> io::Result<usize> {
        self.next(&self.selections, msg)
    }

    fn confirm(&self, msg: &str, _default: bool) -> io::Result<bool> {
        self.next(&self.confirmations, msg)
    }
}

/// Records opened URLs, optionally failing like a headless machine would.
#[derive(Default)]
pub struct RecordingOpener {
    pub opened: RefCell<Vec<String>>,
    pub fail: bool,
}

impl Opener for RecordingOpener {
    fn open(&self, target: &str) -> Result<()> {
        self.opened.borrow_mut().push(target.to_string());
        if self.fail {
            bail!("no browser available");
        }
        Ok(())
    }
}

/// Returns canned stdout per program path and records every call.
#[derive(Default)]
pub struct MockCommandRunner {
    pub responses: Mutex<Vec<(String, String)>>,
    pub calls: Mutex<Vec<(String, Vec<String>, Vec<(String, String)>)>>,
    pub exit_code: i32,
}

impl MockCommandRunner {
    pub fn respond(self, program_suffix: &str, stdout: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((program_suffix.to_string(), stdout.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>, Vec<(String, String)>)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, program: &str, args: &[&str], env: &[(String, String)]) {
        self.calls.lock().unwrap().push((
            program.to_string(),
            args.iter().map(|a| a.to_string()).collect(),
            env.to_vec(),
        ));
    }
}

#[cfg(unix)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}

impl CommandRunner for MockCommandRunner {
    fn capture(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.record(program, args, &[]);
        let responses = self.responses.lock().unwrap();
        let Some((_, stdout)) = responses.iter().find(|(suffix, _)| program.ends_with(suffix.as_str()))
        else {
            bail!("couldn't run '{program}'");
        };
        Ok(Output {
            status: exit_status(self.exit_code),
            stdout: stdout.clone().into_bytes(),
            stderr: Vec::new(),
        })
    }

    fn exec(&self, program: &str, args: &[&str], env: &[(String, String)]) -> Result<ExitStatus> {
        self.record(program, args, env);
        Ok(exit_status(self.exit_code))
    }
}
