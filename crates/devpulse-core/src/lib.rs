pub mod charts;
pub mod error;
pub mod payload;
pub mod platform;
pub mod prompt;
pub mod store;
pub mod types;

pub use charts::{ChartData, ChartKind};
pub use error::{PulseError, Result};
pub use payload::{
    AzureDevOpsData, DatadogData, DesignFile, DesignProject, FigmaData, GithubData,
    LinkedPullRequest, LogDigest, LogEntry, MetricSample, PlatformPayload, PullRequest,
    Repository, WorkItem,
};
pub use platform::{Platform, Scope};
pub use prompt::PromptBuilder;
pub use store::{
    ContextStore, InMemoryStore, JsonFileStore, SnapshotStore, CONTEXT_FILE_NAME,
    DEFAULT_DATA_DIR,
};
pub use types::{
    ContextDocument, ContextStatus, ContextView, DataSources, FetchStatus, PlatformSection,
    SourceStatus, Summary,
};
