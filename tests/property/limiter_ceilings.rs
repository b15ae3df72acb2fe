// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for the Quota Limiter

use cim_landing_zone::limiter::{Limiter, QuotaCeiling, QuotaKind};
use proptest::prelude::*;

fn quota_kind() -> impl Strategy<Value = QuotaKind> {
    prop_oneof![
        Just(QuotaKind::Ec2Eips),
        Just(QuotaKind::VpcPerRegion),
        Just(QuotaKind::VpcInterfaceEndpointsPerVpc),
        Just(QuotaKind::CloudFormationStackCount),
        Just(QuotaKind::CloudFormationStackSetPerAdmin),
        Just(QuotaKind::OrganizationsMaximumAccounts),
    ]
}

proptest! {
    /// A ceiling of K admits exactly K reservations, then refuses
    #[test]
    fn prop_ceiling_admits_exactly_its_value(kind in quota_kind(), value in 0u32..40) {
        let limiter = Limiter::new(vec![QuotaCeiling {
            account_key: "dev".to_string(),
            kind,
            value,
            region: None,
        }]);

        let granted = (0..=value)
            .filter(|_| limiter.try_reserve("dev", kind, Some("ca-central-1"), None))
            .count() as u32;
        prop_assert_eq!(granted, value);
        prop_assert!(!limiter.try_reserve("dev", kind, Some("ca-central-1"), None));
        prop_assert_eq!(limiter.used("dev", kind, Some("ca-central-1"), None), value);
    }

    /// Kinds without a ceiling are never refused
    #[test]
    fn prop_unconfigured_kind_always_admits(kind in quota_kind(), calls in 1usize..200) {
        let limiter = Limiter::unbounded();
        for _ in 0..calls {
            prop_assert!(limiter.try_reserve("dev", kind, Some("ca-central-1"), Some("Dev")));
        }
    }

    /// Counters of different discriminators never interfere
    #[test]
    fn prop_discriminators_count_separately(value in 1u32..10, networks in 1usize..6) {
        let kind = QuotaKind::VpcInterfaceEndpointsPerVpc;
        let limiter = Limiter::new(vec![QuotaCeiling {
            account_key: "shared-network".to_string(),
            kind,
            value,
            region: None,
        }]);

        for n in 0..networks {
            let network = format!("Network{}", n);
            for _ in 0..value {
                prop_assert!(limiter.try_reserve("shared-network", kind, None, Some(&network)));
            }
            prop_assert!(!limiter.try_reserve("shared-network", kind, None, Some(&network)));
        }
    }
}
