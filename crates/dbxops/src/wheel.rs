//! Wheel versions in a workspace folder and the retention rule that decides
//! which of them may go.

use crate::client::WorkspaceApi;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use dbxops_protocol::{ObjectType, WorkspaceObject};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

/// Workspace folder that holds every deployed version of `wheel_name`.
pub fn wheel_folder(wheel_name: &str) -> String {
    format!("/Shared/{}", wheel_name)
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^v?(?:(?P<epoch>\d+)!)?(?P<release>\d+(?:\.\d+)*)(?:[-_.]?(?P<pre_l>a|b|c|rc|alpha|beta|pre|preview)[-_.]?(?P<pre_n>\d+)?)?(?:-(?P<post_n1>\d+)|[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>\d+)?)?(?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>\d+)?)?(?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?$",
        )
        .unwrap_or_else(|e| panic!("invalid version pattern: {e}"))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PreKind {
    Alpha,
    Beta,
    ReleaseCandidate,
}

/// A PEP 440 version as found in wheel file names.
///
/// Comparison follows PEP 440: trailing zero release segments are ignored
/// (`1.0 == 1.0.0`), dev releases sort before pre-releases, which sort before
/// the final release, which sorts before post releases.
#[derive(Debug, Clone)]
pub struct WheelVersion {
    raw: String,
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreKind, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Option<String>,
}

impl WheelVersion {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn release_cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }

    /// Sort key for the pre-release part. A bare dev release sorts below
    /// every pre-release; a final release sorts above all of them.
    fn pre_key(&self) -> (i8, Option<(PreKind, u64)>) {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => (-1, None),
            (None, _, _) => (1, None),
            (Some(pre), _, _) => (0, Some(pre)),
        }
    }

    fn post_key(&self) -> (i8, u64) {
        self.post.map_or((-1, 0), |n| (0, n))
    }

    fn dev_key(&self) -> (i8, u64) {
        self.dev.map_or((1, 0), |n| (0, n))
    }

    fn local_cmp(&self, other: &Self) -> Ordering {
        match (&self.local, &other.local) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => {
                let split = |s: &str| -> Vec<String> {
                    s.split(['.', '-', '_']).map(str::to_string).collect()
                };
                let (a, b) = (split(a), split(b));
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                        (Ok(x), Ok(y)) => x.cmp(&y),
                        // Numeric segments sort above alphanumeric ones.
                        (Ok(_), Err(_)) => Ordering::Greater,
                        (Err(_), Ok(_)) => Ordering::Less,
                        (Err(_), Err(_)) => x.cmp(y),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
        }
    }
}

impl FromStr for WheelVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        let invalid = |reason: &str| Error::InvalidVersion {
            version: s.to_string(),
            reason: reason.to_string(),
        };
        let caps = version_regex()
            .captures(&normalized)
            .ok_or_else(|| invalid("not a PEP 440 version"))?;

        let number = |name: &str| -> Result<Option<u64>> {
            caps.name(name)
                .map(|m| m.as_str().parse::<u64>().map_err(|_| invalid("segment out of range")))
                .transpose()
        };

        let release = caps
            .name("release")
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| invalid("segment out of range")))
            .collect::<Result<Vec<_>>>()?;

        let pre = match caps.name("pre_l").map(|m| m.as_str()) {
            Some(label) => {
                let kind = match label {
                    "a" | "alpha" => PreKind::Alpha,
                    "b" | "beta" => PreKind::Beta,
                    _ => PreKind::ReleaseCandidate,
                };
                Some((kind, number("pre_n")?.unwrap_or(0)))
            }
            None => None,
        };

        let post = match (number("post_n1")?, caps.name("post_l")) {
            (Some(n), _) => Some(n),
            (None, Some(_)) => Some(number("post_n2")?.unwrap_or(0)),
            (None, None) => None,
        };

        let dev = match caps.name("dev_l") {
            Some(_) => Some(number("dev_n")?.unwrap_or(0)),
            None => None,
        };

        Ok(Self {
            raw: s.trim().to_string(),
            epoch: number("epoch")?.unwrap_or(0),
            release,
            pre,
            post,
            dev,
            local: caps.name("local").map(|m| m.as_str().to_string()),
        })
    }
}

impl Ord for WheelVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.release_cmp(other))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post_key().cmp(&other.post_key()))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local_cmp(other))
    }
}

impl PartialOrd for WheelVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for WheelVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for WheelVersion {}

impl fmt::Display for WheelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Version embedded in a wheel path.
///
/// Wheel names are `{name}-{version}-{python}-{abi}-{platform}.whl`, so the
/// version is the fourth dash-separated segment from the end. Counting from
/// the end keeps hyphenated package names working.
pub fn version_from_wheel_path(path: &str) -> Result<(String, WheelVersion)> {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let segments: Vec<&str> = file_name.split('-').collect();
    if segments.len() < 4 {
        return Err(Error::InvalidWheelName {
            file_name: file_name.to_string(),
            reason: format!("expected at least 4 '-' separated parts, found {}", segments.len()),
        });
    }
    let raw = segments[segments.len() - 4].to_string();
    let version = raw.parse()?;
    Ok((raw, version))
}

/// One deployed wheel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub path: String,
    pub raw_version: String,
    pub version: WheelVersion,
    pub created_at_millis: i64,
}

impl ArtifactRecord {
    /// `None` for objects that are not wheel files.
    pub fn from_object(object: &WorkspaceObject) -> Result<Option<Self>> {
        if object.object_type != ObjectType::File || !object.path.ends_with(".whl") {
            return Ok(None);
        }
        let (raw_version, version) = version_from_wheel_path(&object.path)?;
        let created_at_millis = object
            .created_at
            .ok_or_else(|| Error::invalid_response(&object.path, "workspace object has no created_at"))?;
        Ok(Some(Self {
            path: object.path.clone(),
            raw_version,
            version,
            created_at_millis,
        }))
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Wheels in `folder`, in listing order.
///
/// Directories and non-wheel files are skipped. A wheel with an unparsable
/// version fails the whole listing.
pub async fn list_artifacts<W>(api: &W, folder: &str) -> Result<Vec<ArtifactRecord>>
where
    W: WorkspaceApi + ?Sized,
{
    let objects = api.list(folder).await?;
    let total = objects.len();
    let mut artifacts = Vec::new();
    for object in &objects {
        if let Some(record) = ArtifactRecord::from_object(object)? {
            artifacts.push(record);
        }
    }
    debug!(folder, objects = total, wheels = artifacts.len(), "Listed workspace folder");
    Ok(artifacts)
}

/// Count- and age-based survival rule for deployed wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// The most recently created wheels that always survive.
    pub keep_count: usize,
    /// Wheels created within this many days survive.
    pub keep_days: u32,
}

impl RetentionPolicy {
    pub fn new(keep_count: usize, keep_days: u32) -> Self {
        Self {
            keep_count,
            keep_days,
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.keep_days))
    }

    /// Wheels to delete, oldest first.
    ///
    /// A wheel is selected when it is not among the `keep_count` newest and
    /// was created strictly before the cutoff.
    pub fn select_for_deletion(&self, artifacts: &[ArtifactRecord], now: DateTime<Utc>) -> Vec<ArtifactRecord> {
        let mut sorted: Vec<&ArtifactRecord> = artifacts.iter().collect();
        sorted.sort_by_key(|a| a.created_at_millis);

        let candidates = sorted.len().saturating_sub(self.keep_count);
        let cutoff_millis = self.cutoff(now).timestamp_millis();

        sorted[..candidates]
            .iter()
            .filter(|a| a.created_at_millis < cutoff_millis)
            .map(|a| (*a).clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeWorkspace;
    use chrono::TimeZone;

    fn v(s: &str) -> WheelVersion {
        s.parse().unwrap()
    }

    fn artifact(version: &str, created_at: DateTime<Utc>) -> ArtifactRecord {
        ArtifactRecord {
            path: format!("/Shared/pkg/pkg-{version}-py3-none-any.whl"),
            raw_version: version.to_string(),
            version: v(version),
            created_at_millis: created_at.timestamp_millis(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_release_padding_is_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("v2.1"), v("2.1.0.0"));
        assert_ne!(v("1.0.1"), v("1.0"));
    }

    #[test]
    fn test_pep440_ordering() {
        let ordered = ["1.0.dev1", "1.0a1", "1.0b2", "1.0rc1", "1.0", "1.0+local.1", "1.0.post1", "1.1", "1!0.1"];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_invalid_version() {
        let err = "latest".parse::<WheelVersion>().unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
    }

    #[test]
    fn test_version_from_wheel_path() {
        let (raw, version) =
            version_from_wheel_path("/Shared/runner/edp_dbt_runner-1.4.2-py3-none-any.whl").unwrap();
        assert_eq!(raw, "1.4.2");
        assert_eq!(version, v("1.4.2"));

        // Hyphens in the package name do not shift the version.
        let (raw, _) = version_from_wheel_path("dist/my-dbt-pkg-0.9rc1-py3-none-any.whl").unwrap();
        assert_eq!(raw, "0.9rc1");

        let err = version_from_wheel_path("/Shared/pkg/pkg.whl").unwrap_err();
        assert!(matches!(err, Error::InvalidWheelName { .. }));
    }

    #[test]
    fn test_keep_two_for_five_days() {
        let artifacts: Vec<_> = [0, 1, 2, 10, 20]
            .iter()
            .enumerate()
            .map(|(i, days)| artifact(&format!("1.0.{i}"), now() - Duration::days(*days)))
            .collect();

        let doomed = RetentionPolicy::new(2, 5).select_for_deletion(&artifacts, now());
        let versions: Vec<_> = doomed.iter().map(|a| a.raw_version.as_str()).collect();
        // Oldest first: 20 days, then 10 days.
        assert_eq!(versions, vec!["1.0.4", "1.0.3"]);
    }

    #[test]
    fn test_keep_count_covers_everything() {
        let artifacts: Vec<_> = (0..3)
            .map(|i| artifact(&format!("0.{i}"), now() - Duration::days(100 + i)))
            .collect();
        assert!(RetentionPolicy::new(3, 0).select_for_deletion(&artifacts, now()).is_empty());
        assert!(RetentionPolicy::new(10, 0).select_for_deletion(&artifacts, now()).is_empty());
        assert!(RetentionPolicy::new(0, 0).select_for_deletion(&[], now()).is_empty());
    }

    #[test]
    fn test_newest_survive_regardless_of_age() {
        let artifacts: Vec<_> = (0..4)
            .map(|i| artifact(&format!("0.{i}"), now() - Duration::days(400 - i)))
            .collect();
        let doomed = RetentionPolicy::new(1, 30).select_for_deletion(&artifacts, now());
        assert_eq!(doomed.len(), 3);
        assert!(doomed.iter().all(|a| a.raw_version != "0.3"));
    }

    #[test]
    fn test_cutoff_is_strict() {
        let policy = RetentionPolicy::new(0, 5);
        let at_cutoff = artifact("1.0", policy.cutoff(now()));
        let before = artifact("0.9", policy.cutoff(now()) - Duration::milliseconds(1));
        let doomed = policy.select_for_deletion(&[at_cutoff, before], now());
        assert_eq!(doomed.len(), 1);
        assert_eq!(doomed[0].raw_version, "0.9");
    }

    #[tokio::test]
    async fn test_list_artifacts_keeps_wheel_files_only() {
        let ws = FakeWorkspace::default();
        ws.add_file("/Shared/pkg/pkg-1.0.0-py3-none-any.whl", 1_000);
        ws.add_file("/Shared/pkg/README.md", 2_000);
        ws.add_dir("/Shared/pkg/archive.whl");

        let artifacts = list_artifacts(&ws, "/Shared/pkg").await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].file_name(), "pkg-1.0.0-py3-none-any.whl");
        assert_eq!(artifacts[0].created_at_millis, 1_000);

        assert!(list_artifacts(&ws, "/Shared/empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_wheel_fails_listing() {
        let ws = FakeWorkspace::default();
        ws.add_file("/Shared/pkg/pkg-1.0.0-py3-none-any.whl", 1_000);
        ws.add_file("/Shared/pkg/pkg-nightly-py3-none-any.whl", 2_000);
        let err = list_artifacts(&ws, "/Shared/pkg").await.unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
    }
}
