mod builder;
mod classify;
mod run;
#[cfg(test)]
mod tests;
mod tree;

pub use builder::{DocumentBuilder, ParseOutcome, ParserState};
pub use classify::{LineClassifier, LineToken, NoiseRuleSet, normalize_line};
pub use run::run;
pub use tree::DocumentArena;
