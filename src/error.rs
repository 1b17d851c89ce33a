use std::io;

/// Errors produced by the core engine.
///
/// Two categories, following the exit-code split used throughout this
/// workspace's host tooling:
/// - **Precondition failures** (exit code 2): the caller asked for something
///   that cannot be satisfied given the current binding/state. Not retried.
/// - **Operational failures** (exit code 1): a user-actionable rejection of
///   one specific operation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("no interface named '{0}' is available for capture/injection")]
    NoInterface(String),

    #[error("interface has no bound IPv4 address")]
    NoIpv4Address,

    #[error("interface has no MAC address")]
    NoMacAddress,

    #[error("default gateway could not be resolved on this subnet")]
    NoGateway,

    #[error("datalink channel type is not Ethernet")]
    UnsupportedChannel,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("device {0} is not present in the device table")]
    UnknownDevice(String),
}

impl CoreError {
    /// Maps each variant to the process exit code the bundled CLI returns.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NoInterface(_)
            | Self::NoIpv4Address
            | Self::NoMacAddress
            | Self::NoGateway
            | Self::UnsupportedChannel
            | Self::Io(_) => 2,
            Self::UnknownDevice(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_errors_exit_2() {
        assert_eq!(CoreError::NoGateway.exit_code(), 2);
        assert_eq!(CoreError::NoIpv4Address.exit_code(), 2);
    }

    #[test]
    fn operational_errors_exit_1() {
        assert_eq!(CoreError::UnknownDevice("aa:bb".into()).exit_code(), 1);
    }
}
