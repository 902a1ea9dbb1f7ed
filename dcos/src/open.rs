//! Open URLs in the user's browser.

use std::sync::Arc;

use anyhow::{Result, bail};

use crate::command_runner::CommandRunner;

pub trait Opener {
    fn open(&self, target: &str) -> Result<()>;
}

/// Launches the platform's default handler through a [`CommandRunner`].
pub struct OsOpener {
    runner: Arc<dyn CommandRunner>,
}

impl OsOpener {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Program and arguments used to open `target` on this platform.
    pub fn command_for(target: &str) -> (&'static str, Vec<String>) {
        if cfg!(target_os = "macos") {
            ("open", vec![target.to_string()])
        } else if cfg!(windows) {
            (
                "cmd",
                vec!["/c".into(), "start".into(), String::new(), target.to_string()],
            )
        } else {
            ("xdg-open", vec![target.to_string()])
        }
    }
}

impl Opener for OsOpener {
    fn open(&self, target: &str) -> Result<()> {
        let (program, args) = Self::command_for(target);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.runner.capture(program, &args)?;
        if !output.status.success() {
            bail!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        fail: bool,
    }

    fn status(code: i32) -> ExitStatus {
        ExitStatus::from_raw(code << 8)
    }

    impl CommandRunner for Recorder {
        fn capture(&self, program: &str, args: &[&str]) -> Result<Output> {
            self.calls.lock().unwrap().push((
                program.to_string(),
                args.iter().map(|a| a.to_string()).collect(),
            ));
            Ok(Output {
                status: status(if self.fail { 1 } else { 0 }),
                stdout: Vec::new(),
                stderr: b"no display".to_vec(),
            })
        }

        fn exec(&self, _: &str, _: &[&str], _: &[(String, String)]) -> Result<ExitStatus> {
            unreachable!("the opener captures output")
        }
    }

    #[test]
    fn opens_with_platform_command() {
        let runner = Arc::new(Recorder::default());
        OsOpener::new(runner.clone())
            .open("https://example.com/login")
            .unwrap();
        let calls = runner.calls.lock().unwrap();
        let (program, args) = OsOpener::command_for("https://example.com/login");
        assert_eq!(calls[0], (program.to_string(), args));
    }

    #[test]
    fn failing_launcher_is_an_error() {
        let runner = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let err = OsOpener::new(runner).open("https://example.com").unwrap_err();
        assert!(err.to_string().contains("no display"));
    }
}
