//! Cluster schemas (`databricks_cluster.yml`) and the cluster fields shared
//! with job clusters.

use crate::fields::{check_name, schema_struct, PositiveInt};
use crate::{join_path, no_rules, Rules};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeEngine {
    Standard,
    Photon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSecurityMode {
    SingleUser,
    UserIsolation,
    LegacyPassthrough,
    LegacyTableAcl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AzureAvailability {
    SpotAzure,
    SpotWithFallbackAzure,
    OnDemandAzure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AwsAvailability {
    Spot,
    SpotWithFallback,
    OnDemand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterPermission {
    CanAttachTo,
    CanManage,
    CanRestart,
}

no_rules!(
    RuntimeEngine,
    DataSecurityMode,
    AzureAvailability,
    AwsAvailability,
    ClusterPermission,
);

schema_struct! {
    pub struct AzureAttributes ("azure_attributes") {
        pub first_on_demand: i64,
        pub availability: AzureAvailability,
        pub spot_bid_max_price: i64,
    }
}

impl Rules for AzureAttributes {}

schema_struct! {
    pub struct AwsAttributes ("aws_attributes") {
        pub first_on_demand: PositiveInt,
        pub availability: AwsAvailability,
        pub spot_bid_price_percent: PositiveInt,
    }
}

impl Rules for AwsAttributes {}

schema_struct! {
    pub struct Autoscale ("autoscale") {
        pub min_workers: PositiveInt,
        pub max_workers: PositiveInt,
    }
}

impl Rules for Autoscale {}

schema_struct! {
    pub struct ClusterAccess ("access control entry") {
        pub group_name: String,
        pub permission_level: ClusterPermission,
    }
}

impl Rules for ClusterAccess {}

/// Declares a cluster struct carrying the shared cluster fields next to its own.
macro_rules! cluster_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident ($label:literal) {
            $( $(#[$fmeta:meta])* pub $field:ident : $ty:ty, )*
        }
    ) => {
        $crate::fields::schema_struct! {
            $(#[$meta])*
            pub struct $name ($label) {
                $( $(#[$fmeta])* pub $field: $ty, )*
                pub spark_version: String,
                pub node_type_id: String,
                pub runtime_engine: $crate::cluster::RuntimeEngine,
                pub data_security_mode: $crate::cluster::DataSecurityMode,
                pub num_workers: $crate::fields::NonNegativeInt,
                pub autoscale: $crate::cluster::Autoscale,
                pub spark_env_vars: ::std::collections::BTreeMap<String, String>,
                pub azure_attributes: $crate::cluster::AzureAttributes,
                pub aws_attributes: $crate::cluster::AwsAttributes,
                pub access_control: Vec<$crate::cluster::ClusterAccess>,
            }
        }

        impl $name {
            fn validate_cluster_fields(&self, path: &str, errors: &mut Vec<String>) {
                $crate::fields::check_mutually_exclusive(
                    path,
                    &[
                        ("num_workers", self.num_workers.is_set()),
                        ("autoscale", self.autoscale.is_set()),
                    ],
                    errors,
                );
                $crate::fields::check_mutually_exclusive(
                    path,
                    &[
                        ("azure_attributes", self.azure_attributes.is_set()),
                        ("aws_attributes", self.aws_attributes.is_set()),
                    ],
                    errors,
                );
            }
        }
    };
}

pub(crate) use cluster_struct;

cluster_struct! {
    /// One all-purpose cluster.
    pub struct ClusterConfig ("cluster") {
        pub name: String,
        pub autotermination_minutes: PositiveInt,
        pub python_packages: Vec<String>,
    }
}

impl Rules for ClusterConfig {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        let name_path = join_path(path, "name");
        self.name.require(&name_path, errors);
        if let Some(name) = self.name.value() {
            check_name(&name_path, name, errors);
        }
        self.validate_cluster_fields(path, errors);
    }
}

schema_struct! {
    /// Root of `databricks_cluster.yml`.
    pub struct ClustersConfig ("cluster file") {
        pub cluster: Vec<ClusterConfig>,
    }
}

impl Rules for ClustersConfig {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        self.cluster.require(&join_path(path, "cluster"), errors);
    }
}
