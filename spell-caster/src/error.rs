use alloy::primitives::Address;

/// Failures that abort a simulation run.
#[derive(Debug, thiserror::Error)]
pub enum SpellError {
    /// Tenderly answered with a body none of the known response shapes match.
    #[error("unrecognised Tenderly response for {context}: {body}")]
    UnexpectedResponse { context: &'static str, body: String },
    /// The simulation was created but no RPC endpoint could be resolved for it.
    #[error("simulation {0} has no RPC endpoint")]
    MissingEndpoint(String),
    /// Overwriting the chief storage did not make the spell the hat.
    #[error("spell {spell} does not have the hat, chief reports {hat}")]
    HatNotSet { spell: Address, hat: Address },
    /// The visibility update went through but the testnet is still private.
    #[error("testnet {0} is not published")]
    NotPublished(String),
    /// Chainlog keys are `bytes32` strings of at most 31 bytes.
    #[error("chainlog key `{0}` is longer than 31 bytes")]
    KeyTooLong(String),
    /// A timestamp does not fit the packed `uint32` oracle age.
    #[error("oracle age {0} does not fit in uint32")]
    AgeOverflow(u64),
}
