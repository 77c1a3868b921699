use std::time::Duration;

/// Failures talking to the page renderer.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("timed out after {waited:?} waiting for `{selector}`")]
    Timeout { selector: String, waited: Duration },

    #[error("element `{0}` is no longer attached to the page")]
    Detached(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("invalid selector `{0}`")]
    Selector(String),

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

impl DriverError {
    /// Timeouts and detached click targets end the current step, never the run.
    pub fn is_transient(&self) -> bool {
        matches!(self, DriverError::Timeout { .. } | DriverError::Detached(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("result block has no label/value list")]
    MissingInfoList,

    #[error("invalid selector `{0}`")]
    Selector(String),
}

/// Outcomes that stop a run before any record can be produced.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("could not open listing {url}")]
    Navigation {
        url: String,
        #[source]
        source: DriverError,
    },

    #[error("listing container `{selector}` never appeared")]
    ListingMissing { selector: String },

    #[error("no tabs left to scan; check the `tabs` setting and any --tab filter")]
    NoTabs,
}
