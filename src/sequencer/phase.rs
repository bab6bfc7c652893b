use std::fmt;

/// Lifecycle of a bootstrap session. Each operation is accepted only from the
/// phase directly before its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    AdminReady,
    ChannelReady,
    ClientReady,
    ChaincodeReady,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Initialized => "initialized",
            Phase::AdminReady => "admin ready",
            Phase::ChannelReady => "channel ready",
            Phase::ClientReady => "client ready",
            Phase::ChaincodeReady => "chaincode ready",
            Phase::Closed => "closed",
        })
    }
}
