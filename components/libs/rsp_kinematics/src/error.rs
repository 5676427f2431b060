use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KinematicsError {
    #[error("Body model '{0}' has no links")]
    EmptyModel(String),

    #[error("Joint '{joint}' references link '{link}' which does not exist")]
    MissingLink { joint: String, link: String },

    #[error("Link '{link}' has more than one parent joint ('{first}' and '{second}')")]
    MultipleParents {
        link: String,
        first: String,
        second: String,
    },

    #[error("No root link found (every link is the child of a joint)")]
    NoRootLink,

    #[error("Several root links found: {0:?}")]
    MultipleRoots(Vec<String>),

    #[error("Cycle detected in the kinematic tree, unreachable links: {0:?}")]
    CyclicTree(Vec<String>),
}

pub type KinematicsResult<T> = Result<T, KinematicsError>;
