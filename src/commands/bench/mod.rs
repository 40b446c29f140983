mod harness;
mod run;
#[cfg(test)]
mod tests;

pub use harness::BenchmarkHarness;
pub use run::run;
