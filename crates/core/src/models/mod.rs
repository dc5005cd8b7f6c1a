pub mod event;
pub mod policy;
pub mod schedule;
pub mod task;

pub use event::InvocationContext;
pub use policy::{PolicyDocument, Statement};
pub use schedule::{
    ExpressionKind, Schedule, ScheduleIdentity, ScheduleOptions, ScheduleRetryPolicy, TimeWindow,
    TimeWindowMode,
};
pub use task::{EventTask, ScheduleContext, TaskArgs, TaskEnvelope, TaskPath};
