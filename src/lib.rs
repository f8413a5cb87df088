pub mod compare;
pub mod config;
pub mod document;
pub mod error;
pub mod input;
pub mod marathon_client;
pub mod mock_scheduler;
pub mod reconciler;
pub mod scheduler;
pub mod sync;

pub use compare::{Comparator, DiffStyle, IgnoreMask, IgnoreRule};
pub use config::{ClientConfig, SyncPolicy};
pub use document::{AppId, ApplicationSpec, DeploymentAck, FieldPath, LiveApp};
pub use error::ConvergeError;
pub use input::{DesiredSource, Params};
pub use marathon_client::MarathonClient;
pub use mock_scheduler::MockScheduler;
pub use reconciler::{DiffReport, Goal, Invocation, Outcome, Reconciler, Target};
pub use scheduler::Scheduler;
pub use sync::{Condition, StatusSync};
