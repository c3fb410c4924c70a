//! Text commands accepted on both endpoints

/// Command written by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Resume recording on both feeds
    Start,
    /// Pause recording on both feeds
    Stop,
    /// Clear the issuing feed
    Reset,
}

impl Command {
    /// Match `input` against the known command prefixes
    ///
    /// Case-sensitive, checked in the order `start`, `stop`, `reset`; trailing
    /// bytes (newline, anything else) are ignored. Returns `None` for
    /// unrecognized input.
    pub fn parse(input: &[u8]) -> Option<Self> {
        if input.starts_with(b"start") {
            Some(Self::Start)
        } else if input.starts_with(b"stop") {
            Some(Self::Stop)
        } else if input.starts_with(b"reset") {
            Some(Self::Reset)
        } else {
            None
        }
    }

    /// Command keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reset => "reset",
        }
    }
}
