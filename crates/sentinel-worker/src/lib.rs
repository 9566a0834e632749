pub mod capture;
pub mod config;
pub mod error;
pub mod features;
pub mod history;
pub mod pipeline;
pub mod replay;
pub mod scorer;
pub mod stockfish;

pub use error::PipelineError;
