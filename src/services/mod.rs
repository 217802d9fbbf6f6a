pub mod mark_builder;
pub mod mark_validator;
pub mod page_desc;
pub mod session_expired;

pub use mark_builder::{build_mark, format_timestamp, now_timestamp};
pub use mark_validator::validate_mark;
pub use page_desc::{enhance_page_desc, extract_flow_context, has_flow_context, ExtractedFlowContext};
pub use session_expired::{SessionExpiredHandler, TerminalSessionHandler, SESSION_EXPIRED_NOTICE};
