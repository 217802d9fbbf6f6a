pub mod page_submission;

pub use page_submission::{
    classify_response, inject_flow_context, AttemptOutcome, PageSubmission, SubmissionOptions,
    SubmitOverrides, RETRY_DELAYS,
};
