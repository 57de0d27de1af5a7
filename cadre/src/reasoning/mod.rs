//! The bounded reasoning / tool-use loop and its failure-taxonomy mapping.

mod taxonomy;
mod tool_loop;

pub use taxonomy::{
    SUBCODE_UNKNOWN, SubcodeInfo, classify, classify_reason_str, subcode_info, to_failure_record,
    to_trace_outcome,
};
pub use tool_loop::{
    TerminationReason, ToolCallRecord, ToolLoop, ToolLoopConfig, ToolLoopRequest, ToolLoopResult,
};
