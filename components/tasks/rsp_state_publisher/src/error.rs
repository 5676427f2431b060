use rsp_kinematics::KinematicsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RspError {
    #[error("Robot state publisher failed to initialize: {0}")]
    Initialization(String),

    #[error("Invalid robot description: {0}")]
    Kinematics(#[from] KinematicsError),

    #[error("Failed to read configuration file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Syntax error in configuration: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] ron::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid joint state: {0}")]
    InvalidJointState(String),
}

pub type RspResult<T> = Result<T, RspError>;
