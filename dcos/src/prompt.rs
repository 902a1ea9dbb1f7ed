//! Interactive prompts.
//!
//! Login and setup ask the user for credentials, a provider choice and
//! certificate confirmation through the [`Prompt`] trait. On a terminal the
//! questions are rendered with `cliclack`; otherwise they fall back to plain
//! line reads so piped input keeps working.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};

use is_terminal::IsTerminal;

pub trait Prompt {
    fn input(&self, msg: &str) -> io::Result<String>;

    /// Read a secret. Input is not echoed on a terminal.
    fn password(&self, msg: &str) -> io::Result<String>;

    /// Pick one of `labels`, returning its index.
    fn select(&self, msg: &str, labels: &[String]) -> io::Result<usize>;

    /// Ask a yes/no question.
    fn confirm(&self, msg: &str, default: bool) -> io::Result<bool>;
}

/// Something that can be offered in a selection list.
pub trait Selectable {
    fn display_label(&self) -> String;
}

/// Prompt over a slice of [`Selectable`] values.
pub fn select_item<'a, T: Selectable>(
    prompt: &dyn Prompt,
    msg: &str,
    items: &'a [T],
) -> io::Result<&'a T> {
    let labels: Vec<String> = items.iter().map(Selectable::display_label).collect();
    let index = prompt.select(msg, &labels)?;
    items
        .get(index)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid selection"))
}

/// Prompt bound to the process's stdin/stderr.
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn interactive() -> bool {
        io::stdin().is_terminal() && io::stderr().is_terminal()
    }

    fn lines() -> LinePrompt<io::StdinLock<'static>, io::Stderr> {
        LinePrompt::new(io::stdin().lock(), io::stderr())
    }
}

impl Prompt for TerminalPrompt {
    fn input(&self, msg: &str) -> io::Result<String> {
        if !Self::interactive() {
            return Self::lines().input(msg);
        }
        cliclack::input(msg.trim_end_matches([' ', ':'])).interact()
    }

    fn password(&self, msg: &str) -> io::Result<String> {
        if !Self::interactive() {
            return Self::lines().password(msg);
        }
        cliclack::password(msg.trim_end_matches([' ', ':']))
            .mask('▪')
            .interact()
    }

    fn select(&self, msg: &str, labels: &[String]) -> io::Result<usize> {
        if !Self::interactive() {
            return Self::lines().select(msg, labels);
        }
        let mut select = cliclack::select(msg);
        for (index, label) in labels.iter().enumerate() {
            select = select.item(index, label, "");
        }
        select.interact()
    }

    fn confirm(&self, msg: &str, default: bool) -> io::Result<bool> {
        if !Self::interactive() {
            return Self::lines().confirm(msg, default);
        }
        cliclack::confirm(msg).initial_value(default).interact()
    }
}

/// Line-oriented prompt over arbitrary reader and writer.
pub struct LinePrompt<R, W> {
    reader: RefCell<R>,
    writer: RefCell<W>,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: RefCell::new(reader),
            writer: RefCell::new(writer),
        }
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    fn ask(&self, msg: &str) -> io::Result<String> {
        {
            let mut writer = self.writer.borrow_mut();
            write!(writer, "{msg}")?;
            writer.flush()?;
        }
        let mut line = String::new();
        if self.reader.borrow_mut().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no input available",
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl<R: BufRead, W: Write> Prompt for LinePrompt<R, W> {
    fn input(&self, msg: &str) -> io::Result<String> {
        Ok(self.ask(msg)?.trim().to_string())
    }

    fn password(&self, msg: &str) -> io::Result<String> {
        let password = self.ask(msg)?;
        writeln!(self.writer.borrow_mut())?;
        Ok(password)
    }

    fn select(&self, msg: &str, labels: &[String]) -> io::Result<usize> {
        {
            let mut writer = self.writer.borrow_mut();
            writeln!(writer, "{msg}")?;
            for (index, label) in labels.iter().enumerate() {
                writeln!(writer, "({}) {label}", index + 1)?;
            }
        }
        loop {
            let answer = self.ask(&format!("Enter [1-{}]: ", labels.len()))?;
            match answer.trim().parse::<usize>() {
                Ok(n) if (1..=labels.len()).contains(&n) => return Ok(n - 1),
                _ => writeln!(self.writer.borrow_mut(), "Invalid choice '{}'.", answer.trim())?,
            }
        }
    }

    fn confirm(&self, msg: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let answer = self.ask(&format!("{msg} {hint} "))?;
            match answer.trim() {
                "" => return Ok(default),
                "y" | "Y" | "yes" | "Yes" => return Ok(true),
                "n" | "N" | "no" | "No" => return Ok(false),
                other => writeln!(self.writer.borrow_mut(), "Invalid answer '{other}'.")?,
            }
        }
    }
}
