//! Error types for landing-zone compilation

use std::fmt;

use thiserror::Error;

use crate::topology::graph::GraphError;

/// Errors that can occur while compiling or running a phase
#[derive(Debug, Error)]
pub enum LandingZoneError {
    /// A configuration reference could not be resolved
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Resource graph invariant violated
    #[error("Resource graph error: {0}")]
    Graph(#[from] GraphError),

    /// NATS connection error
    #[error("NATS connection error: {0}")]
    NatsConnection(String),

    /// Output store read or write failed
    #[error("Output store error: {0}")]
    OutputStore(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The tag collaborator rejected a request
    #[error("Tagging error: {0}")]
    Tagging(String),

    /// A blocking build task panicked or was cancelled
    #[error("Build task failed: {0}")]
    Task(String),
}

/// Result type for landing-zone operations
pub type LandingZoneResult<T> = Result<T, LandingZoneError>;

impl From<async_nats::Error> for LandingZoneError {
    fn from(err: async_nats::Error) -> Self {
        LandingZoneError::NatsConnection(err.to_string())
    }
}

impl From<serde_json::Error> for LandingZoneError {
    fn from(err: serde_json::Error) -> Self {
        LandingZoneError::Serialization(err.to_string())
    }
}

/// The kind of configuration element a network refers to but does not declare
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReference {
    RouteTable(String),
    Subnet(String),
    SecurityGroup(String),
    NatGateway(String),
    InternetGateway,
    VirtualPrivateGateway,
    DuplicateSubnet { subnet: String, az: String },
    DuplicateRouteTable(String),
    DuplicateSecurityGroup(String),
}

impl fmt::Display for MissingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingReference::RouteTable(name) => write!(f, "route table '{}' is not declared", name),
            MissingReference::Subnet(name) => write!(f, "subnet '{}' is not declared", name),
            MissingReference::SecurityGroup(name) => {
                write!(f, "security group '{}' is not declared before use", name)
            }
            MissingReference::NatGateway(key) => write!(f, "NAT gateway '{}' was not created", key),
            MissingReference::InternetGateway => {
                write!(f, "route targets IGW but the network has no internet gateway")
            }
            MissingReference::VirtualPrivateGateway => {
                write!(f, "route targets VGW but the network has no virtual private gateway")
            }
            MissingReference::DuplicateSubnet { subnet, az } => {
                write!(f, "subnet '{}' is declared twice in az '{}'", subnet, az)
            }
            MissingReference::DuplicateRouteTable(name) => {
                write!(f, "route table '{}' is declared twice", name)
            }
            MissingReference::DuplicateSecurityGroup(name) => {
                write!(f, "security group '{}' is declared twice", name)
            }
        }
    }
}

/// A configuration error that aborts one network build
///
/// Always names the offending reference together with the network and
/// account it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Configuration error in network '{network}' of account '{account_key}': {reference}")]
pub struct ConfigurationError {
    pub account_key: String,
    pub network: String,
    pub reference: MissingReference,
}

impl ConfigurationError {
    pub fn new(
        account_key: impl Into<String>,
        network: impl Into<String>,
        reference: MissingReference,
    ) -> Self {
        Self {
            account_key: account_key.into(),
            network: network.into(),
            reference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_names_reference_and_owner() {
        let err = ConfigurationError::new(
            "shared-network",
            "Central",
            MissingReference::RouteTable("Web_Shared".to_string()),
        );
        let msg = LandingZoneError::from(err).to_string();
        assert!(msg.contains("Central"));
        assert!(msg.contains("shared-network"));
        assert!(msg.contains("Web_Shared"));
    }
}
