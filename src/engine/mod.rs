pub mod sampler;
pub mod size_parser;

pub use sampler::{CycleFailure, CycleResult, Direction, SamplingLoop};
pub use size_parser::{parse_size, ParseError, SizeUnit};
