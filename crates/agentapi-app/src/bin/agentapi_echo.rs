//! Scripted echo agent used by the end-to-end tests.
//!
//! Plays back a JSON script of conversation turns: each entry names the user
//! message it expects, how long to pretend to think, and the reply to print.
//! The terminal is redrawn from scratch on every turn, mimicking how real
//! agents repaint their chat transcript.

use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptEntry {
    #[serde(default)]
    expect_message: String,
    #[serde(default)]
    think_duration_ms: u64,
    #[serde(default)]
    response_message: String,
}

enum Turn {
    User(String),
    Agent(String),
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        bail!("usage: agentapi-echo <script.json>");
    }
    let script = load_script(&args[1])?;
    if script.is_empty() {
        bail!("script is empty");
    }
    run(&script)
}

fn load_script(path: &str) -> Result<Vec<ScriptEntry>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script file {path}"))?;
    serde_json::from_str(&data).context("failed to parse script JSON")
}

fn run(script: &[ScriptEntry]) -> Result<()> {
    let mut turns: Vec<Turn> = Vec::new();
    redraw(&turns, false)?;

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let mut script_index = 0;

    while script_index < script.len() {
        let entry = &script[script_index];
        let expected = entry.expect_message.trim();

        // Entries without an expectation fire unprompted (the greeting).
        if expected.is_empty() {
            respond(&mut turns, entry)?;
            script_index += 1;
            continue;
        }

        let Some(line) = lines.next() else {
            break;
        };
        let input = clean_terminal_input(&line.context("failed to read stdin")?);
        if input.is_empty() {
            continue;
        }
        if input != expected {
            bail!("expected message {expected:?} but received {input:?}");
        }

        turns.push(Turn::User(entry.expect_message.trim().to_owned()));
        redraw(&turns, false)?;
        respond(&mut turns, entry)?;
        script_index += 1;
    }

    // Script finished; sit at the prompt forever.
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}

fn respond(turns: &mut Vec<Turn>, entry: &ScriptEntry) -> Result<()> {
    if entry.think_duration_ms > 0 {
        redraw(turns, true)?;
        run_spinner(Duration::from_millis(entry.think_duration_ms))?;
    }
    turns.push(Turn::Agent(entry.response_message.clone()));
    redraw(turns, false)
}

fn redraw(turns: &[Turn], thinking: bool) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    // clear the screen and move the cursor home
    write!(stdout, "\x1b[2J\x1b[H")?;
    for turn in turns {
        match turn {
            Turn::User(content) => writeln!(stdout, "> {content}")?,
            Turn::Agent(content) => writeln!(stdout, "{content}")?,
        }
    }
    if thinking {
        write!(stdout, "Thinking... ")?;
    } else {
        write!(stdout, "> ")?;
    }
    stdout.flush()?;
    Ok(())
}

fn run_spinner(duration: Duration) -> Result<()> {
    let spinner = ['|', '/', '-', '\\'];
    let started = Instant::now();
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{}", spinner[0])?;
    stdout.flush()?;
    let mut i = 0;
    while started.elapsed() < duration {
        let remaining = duration - started.elapsed().min(duration);
        std::thread::sleep(remaining.min(Duration::from_millis(200)));
        i += 1;
        write!(stdout, "\u{8}{}", spinner[i % spinner.len()])?;
        stdout.flush()?;
    }
    Ok(())
}

/// Undo what the terminal did to the typed submission: ANSI sequences
/// (bracketed paste markers included), backspace edits, and stray control
/// characters.
fn clean_terminal_input(input: &str) -> String {
    let stripped = strip_ansi(input);
    let mut out = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        match c {
            '\u{8}' => {
                out.pop();
            }
            '\u{7f}' | '\u{1b}' => {}
            _ => out.push(c),
        }
    }
    out.trim().to_owned()
}

fn strip_ansi(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == 0x1b && index + 1 < bytes.len() && bytes[index + 1] == b'[' {
            index += 2;
            while index < bytes.len() {
                let byte = bytes[index];
                index += 1;
                if (b'@'..=b'~').contains(&byte) {
                    break;
                }
            }
            continue;
        }

        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8(output).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_bracketed_paste_and_backspace_edits() {
        let typed = "x\u{8}\u{1b}[200~hello there\u{1b}[201~";
        assert_eq!(clean_terminal_input(typed), "hello there");
    }

    #[test]
    fn cleans_stray_control_characters() {
        assert_eq!(clean_terminal_input("hi\u{7f}\u{8}"), "h");
        assert_eq!(clean_terminal_input("  spaced  "), "spaced");
    }

    #[test]
    fn strip_ansi_removes_csi_sequences_only() {
        assert_eq!(strip_ansi("a\u{1b}[31mred\u{1b}[0mb"), "aredb");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
