//! Job schemas (`databricks_dbt_job.yml`).
//!
//! Tasks are a union of wheel tasks (dbt) and notebook tasks. The variant is
//! chosen from the fields present before decoding, so a broken task reports
//! errors against the schema it was meant to match instead of both.

use crate::cluster::{cluster_struct, AwsAvailability, AzureAvailability};
use crate::fields::{
    check_cron, check_emails, check_mutually_exclusive, check_uuid4s, schema_struct, PauseStatus,
    PositiveInt,
};
use crate::{join_path, no_rules, Rules, Validate};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunIf {
    AllSuccess,
    AtLeastOneSuccess,
    NoneFailed,
    AllDone,
    AtLeastOneFailed,
    AllFailed,
}

no_rules!(LogLevel, RunIf);

schema_struct! {
    pub struct NotificationSettings ("notification_settings") {
        pub no_alert_for_skipped_runs: bool,
        pub no_alert_for_canceled_runs: bool,
    }
}

impl Rules for NotificationSettings {}

schema_struct! {
    pub struct Schedule ("schedule") {
        pub quartz_cron_expression: String,
        pub timezone_id: String,
        pub pause_status: PauseStatus,
    }
}

impl Rules for Schedule {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        if let Some(expr) = self.quartz_cron_expression.value() {
            check_cron(&join_path(path, "quartz_cron_expression"), expr, errors);
        }
    }
}

schema_struct! {
    pub struct Continuous ("continuous") {
        pub pause_status: PauseStatus,
    }
}

impl Rules for Continuous {}

schema_struct! {
    pub struct Trigger ("trigger") {
        pub pause_status: PauseStatus,
        pub file_arrival_url: String,
        pub file_arrival_min_time_between_triggers_seconds: PositiveInt,
        pub file_arrival_wait_after_last_change_seconds: PositiveInt,
    }
}

impl Rules for Trigger {}

schema_struct! {
    pub struct EmailNotifications ("email_notifications") {
        pub on_failure: Vec<String>,
        pub on_start: Vec<String>,
        pub on_success: Vec<String>,
        pub on_duration_warning_threshold_exceeded: Vec<String>,
    }
}

impl Rules for EmailNotifications {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        check_emails(&join_path(path, "on_failure"), &self.on_failure, errors);
        check_emails(&join_path(path, "on_start"), &self.on_start, errors);
        check_emails(&join_path(path, "on_success"), &self.on_success, errors);
        check_emails(
            &join_path(path, "on_duration_warning_threshold_exceeded"),
            &self.on_duration_warning_threshold_exceeded,
            errors,
        );
    }
}

schema_struct! {
    /// Webhook notification destinations, referenced by id.
    pub struct WebhookNotifications ("webhook_notifications") {
        pub on_failure: Vec<String>,
        pub on_start: Vec<String>,
        pub on_success: Vec<String>,
        pub on_duration_warning_threshold_exceeded: Vec<String>,
    }
}

impl Rules for WebhookNotifications {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        check_uuid4s(&join_path(path, "on_failure"), &self.on_failure, errors);
        check_uuid4s(&join_path(path, "on_start"), &self.on_start, errors);
        check_uuid4s(&join_path(path, "on_success"), &self.on_success, errors);
        check_uuid4s(
            &join_path(path, "on_duration_warning_threshold_exceeded"),
            &self.on_duration_warning_threshold_exceeded,
            errors,
        );
    }
}

schema_struct! {
    pub struct ContinuousConfig ("continuous_config") {
        pub continuous: bool,
        pub finish_after_seconds: PositiveInt,
        pub finish_after_runs: PositiveInt,
    }
}

impl Rules for ContinuousConfig {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        self.continuous.require(&join_path(path, "continuous"), errors);
        self.finish_after_seconds
            .require(&join_path(path, "finish_after_seconds"), errors);
        self.finish_after_runs
            .require(&join_path(path, "finish_after_runs"), errors);
    }
}

schema_struct! {
    /// Elementary data-observability report settings of a dbt task.
    pub struct ElementaryConfig ("elementary") {
        pub update_github_pages: bool,
        pub max_days_back: i64,
        pub earliest_date_back: NaiveDate,
        pub teams_notification: bool,
    }
}

impl Rules for ElementaryConfig {}

cluster_struct! {
    /// A cluster defined inline in the job and referenced by `job_cluster_key`.
    pub struct JobClusterConfig ("job cluster") {
        pub job_cluster_key: String,
    }
}

impl Rules for JobClusterConfig {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        self.job_cluster_key
            .require(&join_path(path, "job_cluster_key"), errors);
        self.validate_cluster_fields(path, errors);
    }
}

/// Declares a task struct with the fields every task type shares.
macro_rules! task_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident ($label:literal) {
            $( $(#[$fmeta:meta])* pub $field:ident : $ty:ty, )*
        }
    ) => {
        schema_struct! {
            $(#[$meta])*
            pub struct $name ($label) {
                $( $(#[$fmeta])* pub $field: $ty, )*
                pub task_key: String,
                pub log_level: LogLevel,
                pub http_path: String,
                pub max_retries: i64,
                pub min_retry_interval_millis: PositiveInt,
                pub timeout_seconds: PositiveInt,
                pub task_runtime_warning_threshold_seconds: PositiveInt,
                pub depends_on: Vec<String>,
                pub run_if: RunIf,
                pub existing_cluster_id: String,
                pub existing_cluster_name: String,
                pub job_cluster_key: String,
                pub email_notifications: EmailNotifications,
                pub webhook_notifications: WebhookNotifications,
            }
        }

        impl $name {
            fn validate_task_fields(&self, path: &str, errors: &mut Vec<String>) {
                self.task_key.require(&join_path(path, "task_key"), errors);
                check_mutually_exclusive(
                    path,
                    &[
                        ("existing_cluster_id", self.existing_cluster_id.is_set()),
                        ("existing_cluster_name", self.existing_cluster_name.is_set()),
                        ("job_cluster_key", self.job_cluster_key.is_set()),
                    ],
                    errors,
                );
            }
        }
    };
}

task_struct! {
    /// Runs dbt from the project wheel.
    pub struct WheelTaskConfig ("wheel task") {
        pub dbt_command: String,
        pub package_name: String,
        pub entry_point: String,
        pub dbt_vars: BTreeMap<String, serde_yaml::Value>,
        pub elementary: ElementaryConfig,
        pub continuous_config: ContinuousConfig,
        pub cluster_type: String,
    }
}

impl Rules for WheelTaskConfig {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        self.validate_task_fields(path, errors);
    }
}

task_struct! {
    pub struct NotebookTaskConfig ("notebook task") {
        pub notebook_path: String,
        pub parameters: BTreeMap<String, String>,
        pub python_packages: Vec<String>,
    }
}

impl Rules for NotebookTaskConfig {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        self.validate_task_fields(path, errors);
    }
}

/// Which task schema a raw task mapping belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Wheel,
    Notebook,
    Unknown,
}

impl TaskKind {
    /// `dbt_command` wins over `notebook_path`; both must be truthy.
    pub fn of(task: &serde_yaml::Value) -> Self {
        if task.get("dbt_command").is_some_and(is_truthy) {
            TaskKind::Wheel
        } else if task.get("notebook_path").is_some_and(is_truthy) {
            TaskKind::Notebook
        } else {
            TaskKind::Unknown
        }
    }
}

fn is_truthy(value: &serde_yaml::Value) -> bool {
    use serde_yaml::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(s) => !s.is_empty(),
        Value::Mapping(m) => !m.is_empty(),
        Value::Tagged(t) => is_truthy(&t.value),
    }
}

#[derive(Debug, Clone)]
pub enum TaskConfig {
    Wheel(WheelTaskConfig),
    Notebook(NotebookTaskConfig),
}

impl TaskConfig {
    /// Discriminate and decode one raw task.
    pub fn parse(raw: &serde_yaml::Value) -> Result<Self, String> {
        match TaskKind::of(raw) {
            TaskKind::Wheel => serde_yaml::from_value(raw.clone())
                .map(TaskConfig::Wheel)
                .map_err(|e| format!("wheel task: {}", e)),
            TaskKind::Notebook => serde_yaml::from_value(raw.clone())
                .map(TaskConfig::Notebook)
                .map_err(|e| format!("notebook task: {}", e)),
            TaskKind::Unknown => Err(
                "no matching task type; a task needs either 'dbt_command' or 'notebook_path'"
                    .to_string(),
            ),
        }
    }

    pub fn task_key(&self) -> Option<&str> {
        match self {
            TaskConfig::Wheel(t) => t.task_key.value().map(String::as_str),
            TaskConfig::Notebook(t) => t.task_key.value().map(String::as_str),
        }
    }
}

impl Validate for TaskConfig {
    fn validate(&self, path: &str, errors: &mut Vec<String>) {
        match self {
            TaskConfig::Wheel(t) => t.validate(path, errors),
            TaskConfig::Notebook(t) => t.validate(path, errors),
        }
    }
}

schema_struct! {
    pub struct AzureAvailabilityConfig ("azure_attributes") {
        pub availability: AzureAvailability,
    }
}

impl Rules for AzureAvailabilityConfig {}

schema_struct! {
    pub struct AwsAvailabilityConfig ("aws_attributes") {
        pub availability: AwsAvailability,
    }
}

impl Rules for AwsAvailabilityConfig {}

schema_struct! {
    pub struct JobClusterAvailability ("job_cluster") {
        pub azure_attributes: AzureAvailabilityConfig,
        pub aws_attributes: AwsAvailabilityConfig,
    }
}

impl Rules for JobClusterAvailability {}

schema_struct! {
    /// One job. `tasks` stay raw until [`JobConfig::parsed_tasks`]
    /// discriminates them.
    pub struct JobConfig ("job") {
        pub name: String,
        pub tasks: Vec<serde_yaml::Value>,
        pub job_clusters: Vec<JobClusterConfig>,
        pub trigger_once_after_deploy: bool,
        pub timeout_seconds: PositiveInt,
        pub job_runtime_warning_threshold_seconds: PositiveInt,
        pub max_concurrent_runs: PositiveInt,
        pub email_notifications: EmailNotifications,
        pub webhook_notifications: WebhookNotifications,
        pub notification_settings: NotificationSettings,
        pub schedule: Schedule,
        pub tags: BTreeMap<String, String>,
        pub continuous: Continuous,
        pub trigger: Trigger,
        pub queue: bool,
        pub azure_availability: AzureAvailabilityConfig,
        pub aws_availability: AwsAvailabilityConfig,
        pub cluster_type: String,
    }
}

impl JobConfig {
    pub fn parsed_tasks(&self) -> Vec<Result<TaskConfig, String>> {
        self.tasks
            .value()
            .into_iter()
            .flatten()
            .map(TaskConfig::parse)
            .collect()
    }
}

impl Rules for JobConfig {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        self.name.require(&join_path(path, "name"), errors);

        let tasks_path = join_path(path, "tasks");
        self.tasks.require(&tasks_path, errors);
        for (i, task) in self.parsed_tasks().into_iter().enumerate() {
            let task_path = format!("{}[{}]", tasks_path, i);
            match task {
                Ok(task) => task.validate(&task_path, errors),
                Err(message) => errors.push(format!("{}: {}", task_path, message)),
            }
        }

        check_mutually_exclusive(
            path,
            &[
                ("schedule", self.schedule.is_set()),
                ("continuous", self.continuous.is_set()),
                ("trigger", self.trigger.is_set()),
            ],
            errors,
        );
    }
}

schema_struct! {
    /// Root of `databricks_dbt_job.yml`.
    pub struct JobsConfig ("job file") {
        pub jobs: Vec<JobConfig>,
        pub job_cluster: JobClusterAvailability,
    }
}

impl Rules for JobsConfig {
    fn rules(&self, path: &str, errors: &mut Vec<String>) {
        self.jobs.require(&join_path(path, "jobs"), errors);
        self.job_cluster.require(&join_path(path, "job_cluster"), errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(yaml: &str) -> Vec<String> {
        let config: JobsConfig = serde_yaml::from_str(yaml).unwrap();
        let mut errors = Vec::new();
        config.validate("", &mut errors);
        errors
    }

    const VALID: &str = r#"
job_cluster:
  azure_attributes:
    availability: SPOT_WITH_FALLBACK_AZURE
jobs:
  - name: daily_run
    trigger_once_after_deploy: true
    schedule:
      quartz_cron_expression: "0 0 6 * * ?"
      timezone_id: Europe/Amsterdam
      pause_status: UNPAUSED
    email_notifications:
      on_failure: [data-team@example.com]
    tasks:
      - task_key: run
        dbt_command: "dbt build"
        run_if: ALL_SUCCESS
        job_cluster_key: small
        elementary:
          earliest_date_back: 2024-01-31
      - task_key: export
        notebook_path: /Shared/export
        depends_on: [run]
        parameters: {target: prod}
    job_clusters:
      - job_cluster_key: small
        num_workers: 1
"#;

    #[test]
    fn test_valid_jobs_file() {
        assert!(validate(VALID).is_empty(), "{:?}", validate(VALID));
        let config: JobsConfig = serde_yaml::from_str(VALID).unwrap();
        let tasks = config.jobs.value().unwrap()[0].parsed_tasks();
        assert!(matches!(tasks[0], Ok(TaskConfig::Wheel(_))));
        assert!(matches!(tasks[1], Ok(TaskConfig::Notebook(_))));
        assert_eq!(tasks[1].as_ref().unwrap().task_key(), Some("export"));
    }

    #[test]
    fn test_task_without_discriminator_has_no_matching_type() {
        let errors = validate(
            r#"
job_cluster: {}
jobs:
  - name: j
    tasks:
      - task_key: mystery
"#,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("jobs[0].tasks[0]: no matching task type"));
    }

    #[test]
    fn test_empty_dbt_command_falls_through_to_notebook() {
        let raw: serde_yaml::Value =
            serde_yaml::from_str("{task_key: t, dbt_command: '', notebook_path: /x}").unwrap();
        assert_eq!(TaskKind::of(&raw), TaskKind::Notebook);
    }

    #[test]
    fn test_wheel_task_errors_name_only_wheel_schema() {
        let errors = validate(
            r#"
job_cluster: {}
jobs:
  - name: j
    tasks:
      - task_key: run
        dbt_command: dbt run
        notebook_params: {}
"#,
        );
        assert_eq!(
            errors,
            vec!["jobs[0].tasks[0]: unknown field `notebook_params` in wheel task"]
        );
    }

    #[test]
    fn test_collects_every_rule_violation() {
        let errors = validate(
            r#"
job_cluster: {}
jobs:
  - name: j
    schedule: {quartz_cron_expression: "not a cron"}
    trigger: {pause_status: PAUSED}
    webhook_notifications:
      on_failure: [not-a-uuid]
    tasks:
      - task_key: run
        dbt_command: dbt run
        existing_cluster_id: "0101-abc"
        job_cluster_key: small
"#,
        );
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains(
            "jobs[0].tasks[0]: Only ONE of these fields can be set at the same time: existing_cluster_id, existing_cluster_name, job_cluster_key"
        )));
        assert!(errors.iter().any(|e| e.contains("Invalid cron expression")));
        assert!(errors.iter().any(|e| e.contains("not a valid UUID")));
        assert!(errors.iter().any(|e| e.contains(
            "jobs[0]: Only ONE of these fields can be set at the same time: schedule, continuous, trigger"
        )));
    }

    #[test]
    fn test_misspelled_notification_key_is_structural_error() {
        let errors = validate(
            r#"
job_cluster: {}
jobs:
  - name: j
    tasks: []
    email_notifications: {on_start: [a@example.com], on_sucess: []}
"#,
        );
        assert_eq!(
            errors,
            vec!["jobs[0].email_notifications: unknown field `on_sucess` in email_notifications"]
        );
    }

    #[test]
    fn test_structural_errors_across_jobs_and_tasks() {
        let errors = validate(
            r#"
jobs:
  - name: j1
    max_concurrent_runs: 0
    tasks:
      - task_key: run
        dbt_command: dbt run
        run_if: SOMETIMES
      - dbt_command: dbt test
        log_level: LOUD
  - tasks: []
"#,
        );
        assert_eq!(errors.len(), 6, "{errors:?}");
        assert_eq!(errors[0], "jobs[0].max_concurrent_runs: expected a positive integer, got 0");
        assert!(errors[1].starts_with("jobs[0].tasks[0].run_if: unknown variant `SOMETIMES`"));
        assert!(errors[2].starts_with("jobs[0].tasks[1].log_level: unknown variant `LOUD`"));
        assert_eq!(errors[3], "jobs[0].tasks[1].task_key: field required");
        assert_eq!(errors[4], "jobs[1].name: field required");
        assert_eq!(errors[5], "job_cluster: field required");
    }
}
