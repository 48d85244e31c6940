use thiserror::Error;

/// A probe reading that cannot be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProbeFault {
    #[error("probe has not reported yet")]
    Missing,
    #[error("probe reported an open or shorted sensor")]
    OutOfRange,
}

/// The secondary-sensor transport did not respond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sensor bus fault")]
pub struct BusFault;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("malformed operand in `{0}`")]
    BadOperand(String),
    #[error(transparent)]
    Bus(#[from] BusFault),
}

impl CommandError {
    /// Short protocol code written back to the console caller.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownCommand(_) => "ERR_CMD",
            Self::BadOperand(_) => "ERR_NUM",
            Self::Bus(_) => "ERR_I2C",
        }
    }
}
