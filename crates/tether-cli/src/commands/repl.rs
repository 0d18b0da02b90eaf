//! `tether repl` - Interactive client for a running bridge.
//!
//! Each line is sent as one request. Control commands (`:cache`, `:roots`,
//! `:ping`) are forwarded as typed.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tether_engine::Client;

use crate::output::StyledOutput;

const PROMPT: &str = "tether> ";

const HELP: &str = "\
Enter an instruction such as player.getStats().getLevel()
Commands:
  :ping     check the bridge is alive
  :roots    list registered roots (* marks the default)
  :cache    list cached members
  help      show this help
  exit      quit";

/// What a line of input asks for
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Help,
    Exit,
    Request(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "help" | ":help" => Input::Help,
        "exit" | "quit" | ":exit" | ":quit" => Input::Exit,
        request => Input::Request(request),
    }
}

pub fn execute(addr: &str, out: &mut StyledOutput) -> anyhow::Result<()> {
    let mut client = Client::connect(addr)?;
    let mut editor = DefaultEditor::new()?;

    let history_path = dirs::home_dir().map(|h| h.join(".tether").join("history"));
    if let Some(ref path) = history_path {
        let _ = editor.load_history(path);
    }

    out.info(&format!("Connected to {}", addr));
    out.value("Type help for help, exit to quit\n");

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => match classify(&line) {
                Input::Empty => continue,
                Input::Help => out.value(HELP),
                Input::Exit => break,
                Input::Request(request) => {
                    let _ = editor.add_history_entry(request);
                    match client.send(request) {
                        Ok(reply) => {
                            out.reply(&reply);
                        }
                        Err(e) => {
                            out.error(&format!("{}", e));
                            break;
                        }
                    }
                }
            },
            Err(ReadlineError::Interrupted) => {
                out.value("(To exit, press Ctrl+D or type exit)");
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                out.error(&format!("{}", e));
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.save_history(path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(classify("   "), Input::Empty);
    }

    #[test]
    fn exit_and_help() {
        assert_eq!(classify("exit"), Input::Exit);
        assert_eq!(classify(" quit "), Input::Exit);
        assert_eq!(classify("help"), Input::Help);
    }

    #[test]
    fn control_commands_are_forwarded() {
        assert_eq!(classify(":cache"), Input::Request(":cache"));
        assert_eq!(classify(":roots"), Input::Request(":roots"));
    }

    #[test]
    fn instructions_are_trimmed() {
        assert_eq!(
            classify("  player.getName()  "),
            Input::Request("player.getName()")
        );
    }
}
