pub mod event_type;
pub mod flow_context;
pub mod loaders;
pub mod mark;
pub mod submission;

pub use event_type::{is_flow_context, is_known_event_type, EventKind};
pub use flow_context::FlowContext;
pub use loaders::{load_all_drafts, load_draft, PageDraft};
pub use mark::{AnswerRecord, Mark, MarkInput, OperationRecord, OperationValue};
pub use submission::{CollectorResponse, SubmissionContext, SubmissionPayload};
