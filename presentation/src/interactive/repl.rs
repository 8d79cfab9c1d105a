//! REPL (Read-Eval-Print Loop) for asking several questions in a row

use crate::runner::SessionRunner;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};

/// What a line typed at the prompt asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Quit,
    Status,
    Help,
    Empty,
    Question(String),
}

impl ReplCommand {
    /// Commands work with or without a leading `/`
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        match line.trim_start_matches('/').to_lowercase().as_str() {
            "quit" | "exit" | "q" => ReplCommand::Quit,
            "status" => ReplCommand::Status,
            "help" | "h" | "?" => ReplCommand::Help,
            _ => ReplCommand::Question(line.to_string()),
        }
    }
}

/// Interactive deliberation REPL
pub struct DeliberationRepl {
    runner: SessionRunner,
    /// Backend status report printed by the `status` command
    status: String,
}

impl DeliberationRepl {
    pub fn new(runner: SessionRunner, status: String) -> Self {
        Self { runner, status }
    }

    /// Run the interactive REPL
    pub async fn run(&self) -> RlResult<()> {
        let mut rl = DefaultEditor::new()?;

        let history_path = dirs::data_dir().map(|p| p.join("deliberate").join("history.txt"));
        if let Some(ref path) = history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(path);
        }

        self.print_welcome();

        loop {
            match rl.readline("❓ ") {
                Ok(line) => match ReplCommand::parse(&line) {
                    ReplCommand::Empty => continue,
                    ReplCommand::Quit => {
                        println!("Goodbye!");
                        break;
                    }
                    ReplCommand::Status => println!("{}", self.status),
                    ReplCommand::Help => Self::print_help(),
                    ReplCommand::Question(question) => {
                        let _ = rl.add_history_entry(question.as_str());
                        self.process_question(&question).await;
                    }
                },
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    println!("Goodbye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(ref path) = history_path {
            let _ = rl.save_history(path);
        }
        Ok(())
    }

    fn print_welcome(&self) {
        let line = "=".repeat(60);
        println!();
        println!("{}", "Interactive Mode".cyan().bold());
        println!("{}", line);
        let names: Vec<String> = self
            .runner
            .use_case()
            .participants()
            .into_iter()
            .map(|p| p.display_name)
            .collect();
        println!("Models: {}", names.join(", "));
        Self::print_help();
        println!("{}", line);
    }

    fn print_help() {
        println!("Enter a question to start a deliberation.");
        println!("  status           - Show backend status");
        println!("  help             - Show this help");
        println!("  quit, exit, q    - Leave (or press Ctrl-D)");
        println!("Ctrl-C during a session stops it after the current step.");
    }

    async fn process_question(&self, question: &str) {
        println!();
        if let Err(e) = self.runner.run(question).await {
            eprintln!("{} {}", "Error:".red().bold(), e);
        }
        println!();
    }
}
