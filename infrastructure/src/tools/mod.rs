//! Tool implementations offered to backends
//!
//! - `web_search`: Tavily web search (needs an API key)
//! - `get_current_datetime`: the current date and time

pub mod clock;
pub mod search;

mod executor;

pub use executor::LocalToolExecutor;
