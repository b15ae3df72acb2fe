// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deferred Tag Application
//!
//! Shares do not carry tags into the consumer accounts. The networks phase
//! records [`SharedResourceTagRequest`]s on the output bus; this pass runs
//! with authority in one consumer account, picks the requests that target
//! it and hands them to a [`TagApplier`].
//!
//! Only subnets, security groups, networks and transit attachments are
//! tagged. A failing request is logged and the pass moves on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::errors::LandingZoneResult;
use crate::output_bus::{OutputBus, OutputFilter, SharedResourceTagRequest, SharedResourceTags, SharedResourceType};
use crate::state_machine::sharing_lifecycle::{SharingInput, SharingState};
use crate::state_machine::StateMachineWithHistory;

/// Cloud-side collaborator that writes tags onto one resource
#[async_trait]
pub trait TagApplier: Send + Sync {
    async fn apply(&self, account_id: &str, request: &SharedResourceTagRequest) -> LandingZoneResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOutcome {
    pub resource_id: String,
    pub resource_type: SharedResourceType,
    pub state: SharingState,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct TaggingSummary {
    pub outcomes: Vec<TagOutcome>,
    /// Requests for this account with a type the applier does not handle
    pub unsupported: usize,
}

impl TaggingSummary {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_none()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }
}

pub fn is_supported(resource_type: SharedResourceType) -> bool {
    !matches!(resource_type, SharedResourceType::Unsupported)
}

/// Every request on the bus that targets `account_id`, in record order
pub fn requests_for(bus: &OutputBus, account_id: &str) -> Vec<SharedResourceTagRequest> {
    bus.find_typed::<SharedResourceTags>(&OutputFilter::new())
        .into_iter()
        .flat_map(|tags| tags.0)
        .filter(|request| request.target_account_ids.iter().any(|id| id == account_id))
        .collect()
}

/// Apply every supported request that targets `account_id`
pub async fn apply_shared_resource_tags(
    bus: &OutputBus,
    account_id: &str,
    applier: &dyn TagApplier,
    applied_at: DateTime<Utc>,
) -> TaggingSummary {
    let mut summary = TaggingSummary::default();

    for request in requests_for(bus, account_id) {
        if !is_supported(request.resource_type) {
            debug!(resource = %request.resource_id, "Skipping unsupported resource type");
            summary.unsupported += 1;
            continue;
        }

        let mut lifecycle = StateMachineWithHistory::new(SharingState::TagsRequested);
        let error = match applier.apply(account_id, &request).await {
            Ok(()) => lifecycle
                .transition_with_history(SharingInput::TagsApplied, applied_at)
                .err()
                .map(|e| e.to_string()),
            Err(e) => {
                error!(
                    account_id = %account_id,
                    resource = %request.resource_id,
                    error = %e,
                    "Tagging failed"
                );
                Some(e.to_string())
            }
        };

        summary.outcomes.push(TagOutcome {
            resource_id: request.resource_id,
            resource_type: request.resource_type,
            state: lifecycle.current,
            error,
        });
    }

    info!(
        account_id = %account_id,
        applied = summary.applied(),
        failed = summary.failed(),
        unsupported = summary.unsupported,
        "Deferred tags applied"
    );
    summary
}
