//! SQL warehouse schemas (`databricks_sql_warehouse.yml`).

use crate::fields::{check_name, schema_struct, PositiveInt};
use crate::{join_path, no_rules, Rules};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarehousePermission {
    CanManage,
    CanUse,
    CanMonitor,
    IsOwner,
}

no_rules!(WarehousePermission);

schema_struct! {
    pub struct WarehouseAccess ("access control entry") {
        pub group_name: String,
        pub permission_level: WarehousePermission,
    }
}

impl Rules for WarehouseAccess {}

schema_struct! {
    pub struct WarehouseTag ("tag") {
        pub key: String,
        pub value: String,
    }
}

impl Rules for WarehouseTag {}

schema_struct! {
    pub struct SqlWarehouseConfig ("sql warehouse") {
        pub name: String,
        pub cluster_size: String,
        pub warehouse_type: String,
        pub enable_serverless_compute: bool,
        pub min_num_clusters: PositiveInt,
        pub max_num_clusters: PositiveInt,
        pub auto_stop_mins: i64,
        pub access_control: Vec<WarehouseAccess>,
        pub tags: Vec<WarehouseTag>,
    }
}

impl Rules for SqlWarehouseConfig {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        let name_path = join_path(path, "name");
        self.name.require(&name_path, errors);
        if let Some(name) = self.name.value() {
            check_name(&name_path, name, errors);
        }
    }
}

schema_struct! {
    /// Root of `databricks_sql_warehouse.yml`.
    pub struct SqlWarehousesConfig ("sql warehouse file") {
        pub sql_warehouse: Vec<SqlWarehouseConfig>,
    }
}

impl Rules for SqlWarehousesConfig {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        self.sql_warehouse
            .require(&join_path(path, "sql_warehouse"), errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Validate;

    #[test]
    fn test_warehouse_names_and_permissions() {
        let config: SqlWarehousesConfig = serde_yaml::from_str(
            r#"
sql_warehouse:
  - name: dbt_warehouse
    cluster_size: 2X-Small
    enable_serverless_compute: true
    max_num_clusters: 2
    access_control:
      - group_name: analysts
        permission_level: CAN_USE
    tags:
      - key: team
        value: data
  - name: bad name
"#,
        )
        .unwrap();
        let mut errors = Vec::new();
        config.validate("", &mut errors);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("sql_warehouse[1].name"));
    }

    #[test]
    fn test_unknown_permission_is_reported_with_its_path() {
        let config: SqlWarehousesConfig = serde_yaml::from_str(
            "sql_warehouse:\n  - name: w\n    min_num_clusters: -3\n    access_control:\n      - permission_level: CAN_RESTART\n",
        )
        .unwrap();
        let mut errors = Vec::new();
        config.validate("", &mut errors);
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert_eq!(
            errors[0],
            "sql_warehouse[0].min_num_clusters: expected a positive integer, got -3"
        );
        assert!(errors[1]
            .starts_with("sql_warehouse[0].access_control[0].permission_level: unknown variant `CAN_RESTART`"));
    }
}
