use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("frame is empty")]
    EmptyFrame,

    #[error("frame dimensions {got:?} do not match session dimensions {expected:?}")]
    FrameShape {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("timestamp {got} is not after previous timestamp {last}")]
    NonMonotonicTimestamp { last: f64, got: f64 },

    #[error("invalid configuration: {0}")]
    Config(String),
}
