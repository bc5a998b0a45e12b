//! Operator commands typed while a recording is running

use colored::Colorize;
use log::debug;
use std::io::BufRead;
use tokio::sync::mpsc;

/// Message used by `:prompt` when no text follows it
pub const DEFAULT_PROMPT_MESSAGE: &str = "Enter value";

const PROMPT_PREFIX: &str = ":prompt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Finish the recording and save it
    Stop,
    /// Insert a prompt step
    Prompt(String),
    /// Ctrl+C or closed input; handled like `Stop`
    Interrupt,
}

/// Parse one line of operator input. Unknown lines yield `None`.
pub fn parse_command(line: &str) -> Option<ControlCommand> {
    let line = line.trim();

    if line.eq_ignore_ascii_case("stop") {
        return Some(ControlCommand::Stop);
    }

    let rest = line.strip_prefix(PROMPT_PREFIX)?;
    let message = rest.trim();
    let message = if message.is_empty() {
        DEFAULT_PROMPT_MESSAGE
    } else {
        message
    };
    Some(ControlCommand::Prompt(message.to_string()))
}

/// Forward commands read line by line from `input` until `Stop` or end of
/// input. End of input sends `Interrupt`.
///
/// Reads on a dedicated OS thread.
pub fn spawn_command_reader<R>(input: R, commands: mpsc::UnboundedSender<ControlCommand>)
where
    R: BufRead + Send + 'static,
{
    std::thread::spawn(move || {
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!("Command input failed: {}", e);
                    break;
                }
            };

            match parse_command(&line) {
                Some(command) => {
                    let stop = command == ControlCommand::Stop;
                    if commands.send(command).is_err() || stop {
                        return;
                    }
                }
                None if line.trim().is_empty() => {}
                None => println!(
                    "{} Type 'stop' or ':prompt message'",
                    "ℹ".blue()
                ),
            }
        }
        let _ = commands.send(ControlCommand::Interrupt);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_case_insensitive() {
        assert_eq!(parse_command("stop"), Some(ControlCommand::Stop));
        assert_eq!(parse_command("  STOP \n"), Some(ControlCommand::Stop));
        assert_eq!(parse_command("Stop"), Some(ControlCommand::Stop));
    }

    #[test]
    fn test_prompt_takes_trimmed_remainder() {
        assert_eq!(
            parse_command(":prompt   Type the OTP  "),
            Some(ControlCommand::Prompt("Type the OTP".to_string()))
        );
    }

    #[test]
    fn test_empty_prompt_uses_default_message() {
        assert_eq!(
            parse_command(":prompt"),
            Some(ControlCommand::Prompt(DEFAULT_PROMPT_MESSAGE.to_string()))
        );
        assert_eq!(
            parse_command(":prompt    "),
            Some(ControlCommand::Prompt(DEFAULT_PROMPT_MESSAGE.to_string()))
        );
    }

    #[test]
    fn test_other_input_is_ignored() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("stopp"), None);
        assert_eq!(parse_command("prompt hello"), None);
    }

    #[tokio::test]
    async fn test_reader_forwards_commands_until_stop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let input = std::io::Cursor::new("hello\n:prompt Solve captcha\nstop\n:prompt late\n");
        spawn_command_reader(input, tx);

        assert_eq!(
            rx.recv().await,
            Some(ControlCommand::Prompt("Solve captcha".to_string()))
        );
        assert_eq!(rx.recv().await, Some(ControlCommand::Stop));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_reader_interrupts_at_end_of_input() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_command_reader(std::io::Cursor::new(":prompt\n"), tx);

        assert_eq!(
            rx.recv().await,
            Some(ControlCommand::Prompt(DEFAULT_PROMPT_MESSAGE.to_string()))
        );
        assert_eq!(rx.recv().await, Some(ControlCommand::Interrupt));
    }
}
