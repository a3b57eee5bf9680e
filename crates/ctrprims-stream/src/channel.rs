//! Stream-type tags of the multiplexed output format.

/// Logical channel carried in byte 0 of a multiplexed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamChannel {
    Stdin = 0,
    Stdout = 1,
    Stderr = 2,
}

impl StreamChannel {
    /// Map a header tag to a channel; `None` for tags the format does not define.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }

    /// The wire tag for this channel.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Returns a human-readable name for the channel.
    pub fn name(self) -> &'static str {
        match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}
