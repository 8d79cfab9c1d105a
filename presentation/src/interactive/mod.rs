//! Interactive mode: one deliberation per question typed at the prompt

pub mod repl;

pub use repl::{DeliberationRepl, ReplCommand};
