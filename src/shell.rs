//! Interactive read-eval loop for `docqa chat`.
//!
//! Generic over the input and output streams so tests can drive it with
//! in-memory buffers.

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::engine::{AnswerEngine, AnswerOutcome};
use crate::session::Session;

pub const WELCOME: &str = "Document Q&A chatbot. Ask about your documents; type 'exit' or 'quit' to stop.";

fn is_exit(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Run the loop until EOF or an exit command. Returns the session so callers
/// can inspect the conversation.
pub async fn run_repl<R: BufRead, W: Write>(
    engine: &AnswerEngine,
    mut input: R,
    mut output: W,
) -> Result<Session> {
    let mut session = Session::new();
    writeln!(output, "{}", WELCOME)?;

    loop {
        write!(output, "You: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }
        if is_exit(&line) {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        match engine.answer(question, &session.messages()).await {
            AnswerOutcome::Answered(answer) => {
                writeln!(output, "Bot: {}", answer)?;
                session.record(question, answer);
            }
            AnswerOutcome::Failed(message) => {
                writeln!(output, "Error occurred: {}", message)?;
            }
        }
    }

    Ok(session)
}
