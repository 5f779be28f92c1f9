use failure::Error;
use failure::Fail;

pub type Result<T> = std::result::Result<T, Error>;

/// Internal-consistency violations. Every other failure mode of the analysis
/// is resolved by a conservative policy (`Unknown` fallbacks, sentinel
/// not-found lookups) rather than an error; reaching one of these variants
/// indicates a bug in the driving engine.
#[derive(Debug, Fail)]
pub enum AnalysisError {
    #[fail(display = "no sink of the allocation graph holds allocation {}", _0)]
    SinkNotFound(String),
    #[fail(
        display = "malformed argument vector for {}: expected {}, got {}",
        instruction, expected, actual
    )]
    MalformedArguments {
        instruction: String,
        expected: usize,
        actual: usize,
    },
    #[fail(display = "value {} was never registered at any node of the chain", _0)]
    ValueNotRegistered(String),
    #[fail(display = "instruction {} defines no result value", _0)]
    MissingResult(String),
}
