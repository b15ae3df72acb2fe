// Copyright (c) 2025 - Cowboy AI, Inc.
//! Landing-Zone Domain Models
//!
//! The validated, in-memory form of the landing-zone configuration and the
//! value objects it is built from.
//!
//! # Value Objects with Invariants
//!
//! - [`Cidr`] - IPv4/IPv6 address block with containment checks
//! - [`RouteTarget`] / [`RuleSource`] / [`NaclSource`] - symbolic configuration
//!   shapes parsed into tagged unions at load time
//! - [`ResourceKind`] - taxonomy of abstract resources emitted into graphs
//!
//! # Configuration
//!
//! - [`LandingZoneConfig`] - accounts and organizational units, each declaring networks
//! - [`NetworkConfig`] - one declared network
//! - [`AccountDirectory`] - account records supplied by the account collaborator

pub mod account;
pub mod config;
pub mod invariants;
pub mod network;
pub mod resource_type;

pub use account::{
    Account, AccountConfig, AccountDirectory, Deployments, LandingZoneConfig,
    OrganizationalUnitConfig, TransitRouterConfig,
};
pub use config::{
    ConfigParseError, DeployTarget, GatewayService, InterfaceEndpointConfig, NaclAction,
    NaclRuleConfig, NaclSource, NatGatewayConfig, NatSubnetRef, NetworkConfig, PeeringConfig,
    PeeringDestination, RouteConfig, RouteDestination, RouteTableConfig, RouteTarget, RuleConfig,
    RuleSource, SecurityGroupConfig, SubnetDefinition, SubnetGroupConfig,
    TransitGatewayAttachConfig, VirtualPrivateGatewayConfig, DEFAULT_ROUTE_TABLE,
};
pub use invariants::{validate_network, ValidationResult};
pub use network::{AddressFamily, Cidr, NetworkError};
pub use resource_type::{ResourceCategory, ResourceKind};
