mod cleaner;
mod handler;
mod run;
#[cfg(test)]
mod tests;

pub use cleaner::{DataCleaner, categorize_failure, recommendations_for};
pub use handler::{RetryHandler, RetryPolicy, Sleeper, ThreadSleeper};
pub use run::run;
