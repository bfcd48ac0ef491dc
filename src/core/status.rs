use std::fmt;
use std::str::FromStr;
use crate::core::error::PipelineError;

/// How a poll should be answered, before the token is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    KeepPolling,
    Succeeded,
    Failed,
}

/// A stage's closed set of platform states and its state-to-verdict table.
pub trait StageStatus: FromStr<Err = PipelineError> + Copy + fmt::Display {
    const STAGE: &'static str;

    fn verdict(self) -> Verdict;

    fn message(self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStatus {
    InProgress,
    Completed,
    Failed,
    Stopping,
    Stopped,
}

impl StageStatus for TrainingStatus {
    const STAGE: &'static str = "training";

    fn verdict(self) -> Verdict {
        match self {
            TrainingStatus::InProgress | TrainingStatus::Stopping => Verdict::KeepPolling,
            TrainingStatus::Completed => Verdict::Succeeded,
            TrainingStatus::Failed | TrainingStatus::Stopped => Verdict::Failed,
        }
    }

    fn message(self) -> &'static str {
        match self {
            TrainingStatus::InProgress => "Training job in progress",
            TrainingStatus::Completed => "Training job completed",
            TrainingStatus::Failed => "Training Job Failed",
            TrainingStatus::Stopping => "Training job stopping",
            TrainingStatus::Stopped => "Training Job Stopped",
        }
    }
}

impl FromStr for TrainingStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "InProgress" => Ok(TrainingStatus::InProgress),
            "Completed" => Ok(TrainingStatus::Completed),
            "Failed" => Ok(TrainingStatus::Failed),
            "Stopping" => Ok(TrainingStatus::Stopping),
            "Stopped" => Ok(TrainingStatus::Stopped),
            other => Err(PipelineError::UnmappedStatus { stage: Self::STAGE, status: other.to_string() }),
        }
    }
}

impl fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    Creating,
    Updating,
    SystemUpdating,
    InService,
    Failed,
    RollingBack,
    OutOfService,
}

impl StageStatus for EndpointStatus {
    const STAGE: &'static str = "endpoint";

    fn verdict(self) -> Verdict {
        match self {
            EndpointStatus::Creating | EndpointStatus::Updating | EndpointStatus::SystemUpdating => Verdict::KeepPolling,
            EndpointStatus::InService => Verdict::Succeeded,
            EndpointStatus::Failed | EndpointStatus::RollingBack | EndpointStatus::OutOfService => Verdict::Failed,
        }
    }

    fn message(self) -> &'static str {
        match self {
            EndpointStatus::Creating => "Endpoint is being created",
            EndpointStatus::Updating => "Endpoint is being updated",
            EndpointStatus::SystemUpdating => "Endpoint system is being updated",
            EndpointStatus::InService => "Endpoint is now in service",
            EndpointStatus::Failed => "Endpoint Creation Failed",
            EndpointStatus::RollingBack => "Endpoint Creation Rollback",
            EndpointStatus::OutOfService => "Endpoint Out of Service",
        }
    }
}

impl FromStr for EndpointStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Creating" => Ok(EndpointStatus::Creating),
            "Updating" => Ok(EndpointStatus::Updating),
            "SystemUpdating" => Ok(EndpointStatus::SystemUpdating),
            "InService" => Ok(EndpointStatus::InService),
            "Failed" => Ok(EndpointStatus::Failed),
            "RollingBack" => Ok(EndpointStatus::RollingBack),
            "OutOfService" => Ok(EndpointStatus::OutOfService),
            other => Err(PipelineError::UnmappedStatus { stage: Self::STAGE, status: other.to_string() }),
        }
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
