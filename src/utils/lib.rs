use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::core::error::PipelineError;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Pipeline stage this invocation belongs to
    #[clap(value_enum)]
    pub stage: StageKind,

    /// Invocation event JSON; read from stdin when omitted
    #[clap(short, long, value_parser)]
    pub event: Option<PathBuf>,

    #[clap(long, env = "PLATFORM_GATEWAY_URL", default_value = "http://localhost:4566")]
    pub gateway: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    Train,
    Deploy,
}

/// What, if anything, follows the timestamp in a generated resource name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSuffix {
    None,
    Random,
}

impl FromStr for NameSuffix {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "none" => Ok(NameSuffix::None),
            "random" => Ok(NameSuffix::Random),
            other => Err(PipelineError::Config(format!(
                "JOB_NAME_SUFFIX must be 'none' or 'random', got '{}'",
                other
            ))),
        }
    }
}

/// `{prefix}-{YYYY-MM-DD-HH-MM-SS}` in UTC. Two calls within the same second
/// give the same name unless a random suffix is requested.
pub fn resource_name(prefix: &str, now: DateTime<Utc>, suffix: NameSuffix) -> String {
    let name = format!("{}-{}", prefix, now.format("%Y-%m-%d-%H-%M-%S"));
    match suffix {
        NameSuffix::None => name,
        NameSuffix::Random => {
            let id = Uuid::new_v4().simple().to_string();
            format!("{}-{}", name, &id[..8])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn names_are_prefix_and_second_precision_timestamp() {
        assert_eq!(resource_name("sentiment", noon(), NameSuffix::None), "sentiment-2024-01-01-12-00-00");
    }

    // Known gap: without a suffix, submissions in the same second collide.
    #[test]
    fn same_second_names_collide_without_suffix() {
        let first = resource_name("sentiment", noon(), NameSuffix::None);
        let second = resource_name("sentiment", noon(), NameSuffix::None);
        assert_eq!(first, second);
    }

    #[test]
    fn random_suffix_separates_same_second_names() {
        let first = resource_name("sentiment", noon(), NameSuffix::Random);
        let second = resource_name("sentiment", noon(), NameSuffix::Random);
        assert_ne!(first, second);
        assert!(first.starts_with("sentiment-2024-01-01-12-00-00-"));
        assert_eq!(first.len(), "sentiment-2024-01-01-12-00-00-".len() + 8);
    }

    #[test]
    fn parses_stage_and_event_path() {
        let args = Args::try_parse_from(["modelrelay", "deploy", "--event", "event.json", "--gateway", "http://gw"]).unwrap();
        assert_eq!(args.stage, StageKind::Deploy);
        assert_eq!(args.event, Some(PathBuf::from("event.json")));
        assert_eq!(args.gateway, "http://gw");
    }
}
