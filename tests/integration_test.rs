//! Integration Tests for Entitle
//!
//! Runs full computations through the dispatcher against the shared
//! equipment fixture:
//! - Processor aggregation at every aggregate and top level
//! - Named user reconciliation
//! - Product aggregations and allocation exclusivity
//! - Transforms, what-if values and configuration errors

mod common;

use common::{fixture, P1, P2, SCOPE};
use entitle::common::{
    Allocation, AttributeValue, ConfigurationError, MetricConfig, MetricDefinition,
    NamedUserMetric, UserAllocation, UserRecord,
};
use entitle::{ComputeRequest, ComputedLicenses, EntitleError};

async fn compute(metric: &str, products: &[&str]) -> entitle::Result<ComputedLicenses> {
    let fx = fixture();
    fx.dispatcher
        .compute_licenses(request(metric, products))
        .await
}

fn request(metric: &str, products: &[&str]) -> ComputeRequest {
    ComputeRequest::new(
        SCOPE,
        metric,
        products.iter().map(|p| p.to_string()).collect(),
    )
}

mod processor_tests {
    use super::*;

    #[tokio::test]
    async fn test_rounds_at_cluster_up_to_datacenter() {
        let result = compute("ops_dc", &[P1]).await.unwrap();
        assert_eq!(result.licenses, 112);
        assert!(result.transformed_from.is_none());
    }

    #[tokio::test]
    async fn test_rounds_at_vcenter() {
        // C1 + C2 are summed unrounded inside V1
        let result = compute("ops_dc_vcenter", &[P1]).await.unwrap();
        assert_eq!(result.licenses, 111);
    }

    #[tokio::test]
    async fn test_top_at_vcenter_skips_unreached_roots() {
        // V3 is never reached from the product
        let result = compute("ops_vc", &[P1]).await.unwrap();
        assert_eq!(result.licenses, 88);
    }

    #[tokio::test]
    async fn test_rounds_at_server_up_to_cluster() {
        assert_eq!(compute("ops_cluster", &[P1]).await.unwrap().licenses, 34);
        assert_eq!(compute("ops_cluster", &[P2]).await.unwrap().licenses, 6);
    }

    #[tokio::test]
    async fn test_repeated_computation_is_stable() {
        let fx = fixture();
        let first = fx
            .dispatcher
            .compute_licenses(request("ops_dc", &[P1]))
            .await
            .unwrap();
        let second = fx
            .dispatcher
            .compute_licenses(request("ops_dc", &[P1]))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_simulated_cpu() {
        let fx = fixture();
        let result = fx
            .dispatcher
            .compute_licenses(
                request("ops_cluster", &[P1]).with_simulated("cpu", AttributeValue::Int(1)),
            )
            .await
            .unwrap();
        // C1 = 2 + 2 + 2, C3 = 2 + 4, S9 = 3
        assert_eq!(result.licenses, 15);
    }

    #[tokio::test]
    async fn test_simulation_ignored_for_stored_only_attribute() {
        let fx = fixture();
        let result = fx
            .dispatcher
            .compute_licenses(
                request("ops_cluster", &[P1])
                    .with_simulated("cores_per_processor", AttributeValue::Int(64)),
            )
            .await
            .unwrap();
        assert_eq!(result.licenses, 34);
    }

    #[tokio::test]
    async fn test_explicit_equipment_restricts_the_pool() {
        let fx = fixture();
        let result = fx
            .dispatcher
            .compute_licenses(request("ops_cluster", &[P1]).with_equipment(vec!["S9".into()]))
            .await
            .unwrap();
        assert_eq!(result.licenses, 6);
    }

    #[tokio::test]
    async fn test_unknown_explicit_equipment() {
        let fx = fixture();
        let err = fx
            .dispatcher
            .compute_licenses(request("ops_dc", &[P1]).with_equipment(vec!["S404".into()]))
            .await
            .unwrap_err();
        assert!(matches!(err, EntitleError::NodeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_product_without_equipment_is_zero() {
        let result = compute("ops_dc", &["unknown-product"]).await.unwrap();
        assert_eq!(result.licenses, 0);
    }
}

mod named_user_tests {
    use super::*;

    #[tokio::test]
    async fn test_processor_side_dominates() {
        let result = compute("nup_dc", &[P1]).await.unwrap();
        // 14 x 112, users never exceed the per-root minimum
        assert_eq!(result.licenses, 1568);
        assert_eq!(result.detail, 1568);

        let result = compute("nup_vc", &[P1]).await.unwrap();
        assert_eq!(result.licenses, 88);
        assert_eq!(result.detail, 88);
    }

    #[tokio::test]
    async fn test_user_side_dominates() {
        let fx = fixture();
        fx.graph.insert_user(SCOPE, UserRecord::new("U4", P1, 100).on_equipment("S3"));

        let result = fx
            .dispatcher
            .compute_licenses(request("nup_vc", &[P1]))
            .await
            .unwrap();
        assert_eq!(result.licenses, 110);
        // V1 63, V2 max(19, 103), S9 6
        assert_eq!(result.detail, 172);
    }

    #[tokio::test]
    async fn test_users_claimed_by_other_metric_are_not_counted() {
        let fx = fixture();
        fx.graph.insert_user(SCOPE, UserRecord::new("U4", P1, 100).on_equipment("S3"));
        fx.graph.allocate_user(
            SCOPE,
            UserAllocation {
                product: P1.into(),
                user_id: "U4".into(),
                metric: "uss".into(),
            },
        );

        let result = fx
            .dispatcher
            .compute_licenses(request("nup_vc", &[P1]))
            .await
            .unwrap();
        assert_eq!(result.licenses, 88);
        assert_eq!(result.detail, 88);
    }
}

mod aggregation_tests {
    use super::*;

    #[tokio::test]
    async fn test_members_share_one_traversal() {
        let fx = fixture();
        let result = fx
            .dispatcher
            .compute_licenses_for_aggregation(SCOPE, "ops_dc", "oracle-suite")
            .await
            .unwrap();
        // P2 only adds PA3, whose server is already reached
        assert_eq!(result.licenses, 112);

        let result = fx
            .dispatcher
            .compute_licenses_for_aggregation(SCOPE, "ops_cluster", "oracle-suite")
            .await
            .unwrap();
        assert_eq!(result.licenses, 34);
    }

    #[tokio::test]
    async fn test_no_member_holds_metric() {
        let fx = fixture();
        let result = fx
            .dispatcher
            .compute_licenses_for_aggregation(SCOPE, "uss", "oracle-suite")
            .await
            .unwrap();
        assert_eq!(result, ComputedLicenses::zero());
    }

    #[tokio::test]
    async fn test_report_lists_members() {
        let fx = fixture();
        let report = fx
            .dispatcher
            .report_for_aggregation(SCOPE, "ops_dc", "oracle-suite")
            .await
            .unwrap();
        assert_eq!(report.aggregation.as_deref(), Some("oracle-suite"));
        assert_eq!(report.products, vec![P1.to_string(), P2.to_string()]);
        assert_eq!(report.result.licenses, 112);
    }
}

mod allocation_tests {
    use super::*;

    #[tokio::test]
    async fn test_equipment_claimed_by_other_metric_is_excluded() {
        let fx = fixture();
        fx.graph.allocate(SCOPE, Allocation::new(P1, "S3", "flat"));

        let result = fx
            .dispatcher
            .compute_licenses(request("ops_vc", &[P1]))
            .await
            .unwrap();
        // V2 is only reached through S3
        assert_eq!(result.licenses, 69);

        let flat = fx
            .dispatcher
            .compute_licenses(request("flat", &[P1]))
            .await
            .unwrap();
        assert_eq!(flat.licenses, 5);
    }

    #[tokio::test]
    async fn test_allocation_to_the_metric_itself_is_kept() {
        let fx = fixture();
        fx.graph.allocate(SCOPE, Allocation::new(P1, "S3", "ops_vc"));

        let result = fx
            .dispatcher
            .compute_licenses(request("ops_vc", &[P1]))
            .await
            .unwrap();
        assert_eq!(result.licenses, 88);
    }
}

mod transform_tests {
    use super::*;

    fn transforming(target: &str) -> MetricDefinition {
        MetricDefinition::new(
            "nup_transform",
            MetricConfig::OracleNamedUser(NamedUserMetric {
                processor: common::processor("cluster", "vcenter"),
                users_per_processor: 25,
                transform: true,
                transform_metric_name: Some(target.into()),
            }),
        )
    }

    #[tokio::test]
    async fn test_named_user_computed_as_processor_target() {
        let fx = fixture();
        fx.store.insert_metric(SCOPE, transforming("ops_vc"));
        fx.graph.insert_acquired_right(
            SCOPE,
            entitle::common::AcquiredRight::new(P1, "nup_transform"),
        );

        let result = fx
            .dispatcher
            .compute_licenses(request("nup_transform", &[P1]))
            .await
            .unwrap();
        assert_eq!(result.licenses, 88);
        assert_eq!(result.transformed_from.as_deref(), Some("nup_transform"));

        let target = fx
            .dispatcher
            .compute_licenses(request("ops_vc", &[P1]))
            .await
            .unwrap();
        assert_eq!(target.licenses, 88);
        assert_eq!(target.transformed_from.as_deref(), Some("nup_transform"));
    }

    #[tokio::test]
    async fn test_transform_target_must_be_processor() {
        let fx = fixture();
        fx.store.insert_metric(SCOPE, transforming("flat"));

        let err = fx
            .dispatcher
            .compute_licenses(request("nup_transform", &[P1]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EntitleError::Configuration(ConfigurationError::KindMismatch { .. })
        ));
    }
}

mod configuration_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_metric() {
        let err = compute("missing", &[P1]).await.unwrap_err();
        assert!(matches!(
            err,
            EntitleError::Configuration(ConfigurationError::UnknownMetric { .. })
        ));
    }

    #[tokio::test]
    async fn test_aggregate_below_base() {
        let fx = fixture();
        fx.store.insert_metric(
            SCOPE,
            MetricDefinition::new(
                "ops_broken",
                MetricConfig::OracleProcessor(common::processor("partition", "datacenter")),
            ),
        );

        let err = fx
            .dispatcher
            .compute_licenses(request("ops_broken", &[P1]))
            .await
            .unwrap_err();
        assert!(matches!(err, EntitleError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_core_attribute() {
        let fx = fixture();
        let mut processor = common::processor("cluster", "datacenter");
        processor.num_cores_attr = "threads".into();
        fx.store.insert_metric(
            SCOPE,
            MetricDefinition::new("ops_threads", MetricConfig::OracleProcessor(processor)),
        );

        let err = fx
            .dispatcher
            .compute_licenses(request("ops_threads", &[P1]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EntitleError::Configuration(ConfigurationError::AttributeNotFound { .. })
        ));
    }
}
