//! Field decoding, constrained scalar types and shared rule checks.

use crate::Validate;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// One field of a schema struct, decoded on its own.
///
/// A value that does not fit `T` is kept as [`Field::Invalid`] instead of
/// failing the whole document, so every bad field of a file is reported.
/// `null` counts as absent.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Absent,
    Valid(T),
    Invalid(String),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Absent
    }
}

impl<T> Field<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Valid(value) => Some(value),
            _ => None,
        }
    }

    /// The key is present, whether or not its value decoded.
    pub fn is_set(&self) -> bool {
        !matches!(self, Field::Absent)
    }

    pub fn require(&self, path: &str, errors: &mut Vec<String>) {
        if !self.is_set() {
            errors.push(format!("{}: field required", path));
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(Field::Absent);
        }
        Ok(match serde_yaml::from_value(value) {
            Ok(decoded) => Field::Valid(decoded),
            Err(e) => Field::Invalid(e.to_string()),
        })
    }
}

impl<T: Validate> Validate for Field<T> {
    fn validate(&self, path: &str, errors: &mut Vec<String>) {
        match self {
            Field::Absent => {}
            Field::Valid(value) => value.validate(path, errors),
            Field::Invalid(message) => errors.push(format!("{}: {}", path, message)),
        }
    }
}

/// Keys a schema struct does not declare.
pub fn check_unknown(
    path: &str,
    label: &str,
    unknown: &BTreeMap<String, serde_yaml::Value>,
    errors: &mut Vec<String>,
) {
    for key in unknown.keys() {
        errors.push(format!(
            "{}unknown field `{}` in {}",
            prefix(path),
            key,
            label
        ));
    }
}

fn prefix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{}: ", path)
    }
}

/// Declares a schema struct whose fields are all [`Field`]s.
///
/// Undeclared keys land in `unknown`. The generated `Validate` impl reports
/// unknown keys and undecodable values, then runs the struct's [`Rules`].
///
/// [`Rules`]: crate::Rules
macro_rules! schema_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident ($label:literal) {
            $( $(#[$fmeta:meta])* pub $field:ident : $ty:ty, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, ::serde::Deserialize)]
        #[serde(default)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $crate::fields::Field<$ty>, )*
            #[serde(flatten)]
            pub unknown: ::std::collections::BTreeMap<String, ::serde_yaml::Value>,
        }

        impl $crate::Validate for $name {
            fn validate(&self, path: &str, errors: &mut Vec<String>) {
                $crate::fields::check_unknown(path, $label, &self.unknown, errors);
                $(
                    $crate::Validate::validate(
                        &self.$field,
                        &$crate::join_path(path, stringify!($field)),
                        errors,
                    );
                )*
                $crate::Rules::rules(self, path, errors);
            }
        }
    };
}

pub(crate) use schema_struct;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "i64")]
pub struct PositiveInt(u64);

impl PositiveInt {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<i64> for PositiveInt {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value > 0 {
            Ok(Self(value as u64))
        } else {
            Err(format!("expected a positive integer, got {}", value))
        }
    }
}

/// Integer greater than or equal to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "i64")]
pub struct NonNegativeInt(u64);

impl NonNegativeInt {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<i64> for NonNegativeInt {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value >= 0 {
            Ok(Self(value as u64))
        } else {
            Err(format!("expected a non-negative integer, got {}", value))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PauseStatus {
    #[serde(rename = "PAUSED")]
    Paused,
    #[serde(rename = "UNPAUSED")]
    Unpaused,
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]*$").unwrap_or_else(|e| panic!("name pattern: {e}")))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$")
            .unwrap_or_else(|e| panic!("email pattern: {e}"))
    })
}

/// Resource names: letters, digits and underscores only.
pub fn check_name(path: &str, name: &str, errors: &mut Vec<String>) {
    if !name_regex().is_match(name) {
        errors.push(format!(
            "{}: '{}' does not match pattern '^[a-zA-Z0-9_]*$'",
            path, name
        ));
    }
}

pub fn check_emails(path: &str, emails: &Field<Vec<String>>, errors: &mut Vec<String>) {
    for (i, email) in emails.value().into_iter().flatten().enumerate() {
        if !email_regex().is_match(email) {
            errors.push(format!(
                "{}[{}]: '{}' is not a valid email address",
                path, i, email
            ));
        }
    }
}

/// Webhook destinations are referenced by UUID version 4.
pub fn check_uuid4s(path: &str, ids: &Field<Vec<String>>, errors: &mut Vec<String>) {
    for (i, id) in ids.value().into_iter().flatten().enumerate() {
        match uuid::Uuid::parse_str(id) {
            Ok(parsed) if parsed.get_version_num() == 4 => {}
            Ok(_) => errors.push(format!("{}[{}]: '{}' is not a version 4 UUID", path, i, id)),
            Err(_) => errors.push(format!("{}[{}]: '{}' is not a valid UUID", path, i, id)),
        }
    }
}

pub fn check_cron(path: &str, expr: &str, errors: &mut Vec<String>) {
    if !crate::cron::is_valid_quartz(expr) {
        errors.push(format!("{}: Invalid cron expression '{}'", path, expr));
    }
}

/// At most one of `fields` may be set.
pub fn check_mutually_exclusive(path: &str, fields: &[(&str, bool)], errors: &mut Vec<String>) {
    let set = fields.iter().filter(|(_, is_set)| *is_set).count();
    if set > 1 {
        let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        errors.push(format!(
            "{}Only ONE of these fields can be set at the same time: {}",
            prefix(path),
            names.join(", ")
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_int_rejects_zero() {
        assert!(PositiveInt::try_from(0).is_err());
        assert_eq!(PositiveInt::try_from(5).unwrap().get(), 5);
        assert!(NonNegativeInt::try_from(0).is_ok());
        assert!(NonNegativeInt::try_from(-1).is_err());
    }

    #[test]
    fn test_mutual_exclusion_names_all_fields() {
        let mut errors = Vec::new();
        check_mutually_exclusive(
            "cluster[0]",
            &[("num_workers", true), ("autoscale", true)],
            &mut errors,
        );
        assert_eq!(
            errors,
            vec!["cluster[0]: Only ONE of these fields can be set at the same time: num_workers, autoscale"]
        );
    }

    #[test]
    fn test_mutual_exclusion_over_three_fields() {
        let cases: [([bool; 3], bool); 8] = [
            ([false, false, false], true),
            ([true, false, false], true),
            ([false, true, false], true),
            ([false, false, true], true),
            ([true, true, false], false),
            ([true, false, true], false),
            ([false, true, true], false),
            ([true, true, true], false),
        ];
        for (set, passes) in cases {
            let mut errors = Vec::new();
            check_mutually_exclusive(
                "jobs[0].tasks[0]",
                &[
                    ("existing_cluster_id", set[0]),
                    ("existing_cluster_name", set[1]),
                    ("job_cluster_key", set[2]),
                ],
                &mut errors,
            );
            if passes {
                assert!(errors.is_empty(), "{set:?}: {errors:?}");
            } else {
                assert_eq!(
                    errors,
                    vec!["jobs[0].tasks[0]: Only ONE of these fields can be set at the same time: existing_cluster_id, existing_cluster_name, job_cluster_key"],
                    "{set:?}"
                );
            }
        }
    }

    #[test]
    fn test_field_keeps_decode_error() {
        let yaml = "{a: 3, b: 0, c: ~}";
        let map: BTreeMap<String, Field<PositiveInt>> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(map["a"].value().map(|n| n.get()), Some(3));
        assert_eq!(
            map["b"],
            Field::Invalid("expected a positive integer, got 0".to_string())
        );
        assert!(!map["c"].is_set());

        let mut errors = Vec::new();
        map["b"].validate("min_num_clusters", &mut errors);
        map["c"].require("name", &mut errors);
        assert_eq!(
            errors,
            vec![
                "min_num_clusters: expected a positive integer, got 0",
                "name: field required"
            ]
        );
    }

    #[test]
    fn test_name_email_uuid_checks() {
        let mut errors = Vec::new();
        check_name("name", "good_name_1", &mut errors);
        check_name("name", "bad-name", &mut errors);
        check_emails(
            "on_failure",
            &Field::Valid(vec!["team@example.com".into(), "not-an-email".into()]),
            &mut errors,
        );
        check_uuid4s(
            "on_start",
            &Field::Valid(vec![
                "2c0a8f8e-5b9e-4b5a-9f43-6f1f3d1a7c11".into(),
                "2c0a8f8e-5b9e-1b5a-9f43-6f1f3d1a7c11".into(),
                "nope".into(),
            ]),
            &mut errors,
        );
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors[0].contains("bad-name"));
        assert!(errors[1].starts_with("on_failure[1]"));
        assert!(errors[2].contains("version 4"));
        assert!(errors[3].contains("not a valid UUID"));
    }
}
