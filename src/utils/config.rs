use std::env;
use std::str::FromStr;
use crate::core::error::{PipelineError, PipelineResult};
use crate::utils::lib::NameSuffix;

/// Environment-supplied settings, read fresh for every invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StageConfig {
    pub source_bucket: String,
    pub source_data_uri: String,
    pub dest_bucket: String,
    pub dest_uri: String,
    pub metadata_table: String,
    pub role_arn: String,
    pub image: String,
    pub name_prefix: String,
    pub instance_type: String,
    pub instance_count: u32,
    pub volume_size_gb: u32,
    pub max_runtime_secs: u64,
    pub name_suffix: NameSuffix,
}

impl StageConfig {
    pub fn from_env() -> PipelineResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> PipelineResult<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PipelineError::Config(format!("{} must be set", key)))
        };

        Ok(Self {
            source_bucket: required("SRC_BKT_NAME")?,
            source_data_uri: required("SRC_BKT_URI")?,
            dest_bucket: required("DEST_BKT")?,
            dest_uri: required("DEST_BKT_URI")?,
            metadata_table: required("META_DATA_STORE")?,
            role_arn: required("SAGE_ROLE_ARN")?,
            image: required("FULL_NAME")?,
            name_prefix: required("IMG")?,
            instance_type: required("INSTANCE_TYPE")?,
            instance_count: positive("INSTANCE_CNT", &required("INSTANCE_CNT")?)?,
            volume_size_gb: positive("EBS_VOL_GB", &required("EBS_VOL_GB")?)?,
            max_runtime_secs: positive("RUN_TIME_SEC", &required("RUN_TIME_SEC")?)?,
            name_suffix: match lookup("JOB_NAME_SUFFIX") {
                Some(raw) => raw.parse()?,
                None => NameSuffix::None,
            },
        })
    }
}

fn positive<T>(key: &str, raw: &str) -> PipelineResult<T>
where
    T: FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(PipelineError::Config(format!("{} must be a positive integer, got '{}'", key, raw))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) fn sample_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("SRC_BKT_NAME", "src".to_string()),
            ("SRC_BKT_URI", "s3://src/input/data/".to_string()),
            ("DEST_BKT", "dest".to_string()),
            ("DEST_BKT_URI", "s3://dest/".to_string()),
            ("META_DATA_STORE", "jobs".to_string()),
            ("SAGE_ROLE_ARN", "arn:aws:iam::123:role/exec".to_string()),
            ("FULL_NAME", "123.dkr.ecr/sentiment:latest".to_string()),
            ("IMG", "sentiment".to_string()),
            ("INSTANCE_TYPE", "ml.m5.large".to_string()),
            ("INSTANCE_CNT", "1".to_string()),
            ("EBS_VOL_GB", "30".to_string()),
            ("RUN_TIME_SEC", "3600".to_string()),
        ])
    }

    pub(crate) fn sample_config() -> StageConfig {
        let env = sample_env();
        StageConfig::from_lookup(|key| env.get(key).cloned()).unwrap()
    }

    #[test]
    fn loads_a_complete_environment() {
        let config = sample_config();
        assert_eq!(config.instance_count, 1);
        assert_eq!(config.volume_size_gb, 30);
        assert_eq!(config.max_runtime_secs, 3600);
        assert_eq!(config.name_suffix, NameSuffix::None);
    }

    #[test]
    fn missing_values_are_config_errors() {
        let mut env = sample_env();
        env.remove("META_DATA_STORE");
        let err = StageConfig::from_lookup(|key| env.get(key).cloned()).unwrap_err();
        assert_eq!(err.to_string(), "invalid configuration: META_DATA_STORE must be set");
    }

    #[test]
    fn counts_must_be_positive_integers() {
        for bad in ["0", "-1", "two"] {
            let mut env = sample_env();
            env.insert("INSTANCE_CNT", bad.to_string());
            let err = StageConfig::from_lookup(|key| env.get(key).cloned()).unwrap_err();
            assert!(matches!(err, PipelineError::Config(_)), "{}", bad);
        }
    }

    #[test]
    fn random_suffix_can_be_enabled() {
        let mut env = sample_env();
        env.insert("JOB_NAME_SUFFIX", "random".to_string());
        let config = StageConfig::from_lookup(|key| env.get(key).cloned()).unwrap();
        assert_eq!(config.name_suffix, NameSuffix::Random);
    }
}
