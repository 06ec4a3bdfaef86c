//! This module contains table configurations.

use crate::error::Result;
use crate::{Error, ErrorKind};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Reference to [`TableConfig`].
pub type TableConfigRef = Arc<TableConfig>;

/// Table configuration.
#[derive(PartialEq, Eq, Debug, Default, Clone)]
pub struct TableConfig {
    /// Commit retry configuration.
    pub commit_retry: CommitRetryConfig,
    /// Metadata file configuration.
    pub metadata: MetadataConfig,
}

/// Retry policy of the commit coordinator.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct CommitRetryConfig {
    /// How many times a conflicting commit is retried after the first attempt.
    pub num_retries: usize,
    /// Lower bound of the backoff between two attempts.
    pub min_wait: Duration,
    /// Upper bound of the backoff between two attempts.
    pub max_wait: Duration,
    /// Total time the caller is willing to wait.
    ///
    /// Informational, the retry loop is bounded by `num_retries` only.
    pub total_timeout: Duration,
}

impl Default for CommitRetryConfig {
    fn default() -> Self {
        Self {
            num_retries: 4,
            min_wait: Duration::from_millis(100),
            max_wait: Duration::from_millis(60_000),
            total_timeout: Duration::from_millis(1_800_000),
        }
    }
}

/// Metadata file configuration.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct MetadataConfig {
    /// Max number of previous metadata files kept in the metadata log.
    pub previous_versions_max: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            previous_versions_max: 100,
        }
    }
}

impl TableConfig {
    /// Property key of [`CommitRetryConfig::num_retries`].
    pub const COMMIT_NUM_RETRIES: &'static str = "commit.retry.num-retries";
    /// Property key of [`CommitRetryConfig::min_wait`].
    pub const COMMIT_MIN_RETRY_WAIT_MS: &'static str = "commit.retry.min-wait-ms";
    /// Property key of [`CommitRetryConfig::max_wait`].
    pub const COMMIT_MAX_RETRY_WAIT_MS: &'static str = "commit.retry.max-wait-ms";
    /// Property key of [`CommitRetryConfig::total_timeout`].
    pub const COMMIT_TOTAL_RETRY_TIME_MS: &'static str = "commit.retry.total-timeout-ms";
    /// Property key of [`MetadataConfig::previous_versions_max`].
    pub const METADATA_PREVIOUS_VERSIONS_MAX: &'static str =
        "write.metadata.previous-versions-max";
}

fn parse_property<T>(props: &HashMap<String, String>, key: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    props
        .get(key)
        .map(|v| v.trim().parse::<T>())
        .transpose()
        .map_err(|e| {
            Error::new(ErrorKind::DataInvalid, format!("Can't parse {key}."))
                .with_context("key", key)
                .set_source(e)
        })
}

impl TryFrom<&'_ HashMap<String, String>> for TableConfig {
    type Error = Error;

    fn try_from(value: &'_ HashMap<String, String>) -> Result<Self> {
        let mut config = TableConfig::default();

        parse_property::<usize>(value, Self::COMMIT_NUM_RETRIES)?
            .iter()
            .for_each(|v| config.commit_retry.num_retries = *v);

        parse_property::<u64>(value, Self::COMMIT_MIN_RETRY_WAIT_MS)?
            .iter()
            .for_each(|v| config.commit_retry.min_wait = Duration::from_millis(*v));

        parse_property::<u64>(value, Self::COMMIT_MAX_RETRY_WAIT_MS)?
            .iter()
            .for_each(|v| config.commit_retry.max_wait = Duration::from_millis(*v));

        parse_property::<u64>(value, Self::COMMIT_TOTAL_RETRY_TIME_MS)?
            .iter()
            .for_each(|v| config.commit_retry.total_timeout = Duration::from_millis(*v));

        parse_property::<usize>(value, Self::METADATA_PREVIOUS_VERSIONS_MAX)?
            .iter()
            .for_each(|v| config.metadata.previous_versions_max = *v);

        if config.commit_retry.min_wait > config.commit_retry.max_wait {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "{} must not be larger than {}",
                    Self::COMMIT_MIN_RETRY_WAIT_MS,
                    Self::COMMIT_MAX_RETRY_WAIT_MS
                ),
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(kvs: &[(&str, &str)]) -> HashMap<String, String> {
        kvs.iter()
            .map(|e| (e.0.to_string(), e.1.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_table_config_from_hashmap() {
        let expected_config = TableConfig {
            commit_retry: CommitRetryConfig {
                num_retries: 20,
                min_wait: Duration::from_millis(25),
                max_wait: Duration::from_millis(25),
                total_timeout: Duration::from_millis(1_800_000),
            },
            metadata: MetadataConfig {
                previous_versions_max: 3,
            },
        };

        let config_map = props(&[
            ("commit.retry.num-retries", "20"),
            ("commit.retry.min-wait-ms", "25"),
            ("commit.retry.max-wait-ms", "25"),
            ("write.metadata.previous-versions-max", "3"),
            ("unrelated.property", "whatever"),
        ]);

        let parsed_config = TableConfig::try_from(&config_map).unwrap();

        assert_eq!(expected_config, parsed_config);
    }

    #[test]
    fn test_empty_properties_use_defaults() {
        let parsed = TableConfig::try_from(&HashMap::new()).unwrap();
        assert_eq!(parsed, TableConfig::default());
        assert_eq!(parsed.commit_retry.num_retries, 4);
    }

    #[test]
    fn test_invalid_property() {
        let err = TableConfig::try_from(&props(&[("commit.retry.num-retries", "many")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);

        let err = TableConfig::try_from(&props(&[
            ("commit.retry.min-wait-ms", "500"),
            ("commit.retry.max-wait-ms", "100"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }
}
