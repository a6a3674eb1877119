//! Cost-attribution tags stamped on every resource a benchmark run touches.

use dbxops_protocol::warehouses::CustomTag;
use dbxops_protocol::RunType;
use serde_json::{Map, Value};
use std::fmt;

/// The kind of resource a tag set is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Job,
    JobCluster,
    Sql,
    DltPipeline,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Job => "job",
            Component::JobCluster => "job_cluster",
            Component::Sql => "sql",
            Component::DltPipeline => "dlt_pipeline",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkTags {
    /// `{dbt|dlt}__{component}__{sizing label}`
    pub config: String,
    pub run: u32,
    pub use_case: String,
    pub component: Component,
}

impl BenchmarkTags {
    pub fn new(run_type: RunType, component: Component, label: &str, use_case: &str, run: u32) -> Self {
        Self {
            config: format!(
                "{}__{}__{}",
                run_type.as_str().to_lowercase(),
                component,
                label
            ),
            run,
            use_case: use_case.to_string(),
            component,
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("benchmark_config_run", format!("{}__run_{}", self.config, self.run)),
            ("benchmark_config", self.config.clone()),
            ("benchmark_run_nr", self.run.to_string()),
            ("benchmark_use_case", self.use_case.clone()),
            ("benchmark_component", self.component.to_string()),
        ]
    }

    /// Tags as a JSON object, the shape jobs and clusters use.
    pub fn to_map(&self) -> Map<String, Value> {
        self.pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v)))
            .collect()
    }

    /// Tags as a key/value list, the shape SQL warehouses use.
    pub fn custom_tags(&self) -> Vec<CustomTag> {
        self.pairs()
            .into_iter()
            .map(|(key, value)| CustomTag {
                key: key.to_string(),
                value,
            })
            .collect()
    }

    /// Overlay these tags on an existing `custom_tags` object. Foreign keys
    /// survive; benchmark keys are overwritten.
    pub fn merged_into(&self, existing: Option<&Value>) -> Map<String, Value> {
        let mut merged = existing
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        merged.extend(self.to_map());
        merged
    }
}
