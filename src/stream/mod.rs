//! Upstream line splitting and the Chat Completions -> Messages stream
//! translator.

pub mod sse;
pub mod transcoder;

pub use sse::{anthropic_sse_frame, sse_line_stream, SseLineSplitter};
pub use transcoder::{finish, step, StreamEvents, StreamPhase, StreamState, UsageCapture};
