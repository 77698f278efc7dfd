use std::fmt::{Display, Formatter, Result as FmtResult};

/// Trace/span identifier pair. Both ids are always present together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceContext {
    pub trace_id: i64,
    pub span_id: i64,
}

impl TraceContext {
    pub fn new(trace_id: i64, span_id: i64) -> Self {
        Self { trace_id, span_id }
    }

    /// Parse B3 hex ids. 128-bit trace ids keep their lower 64 bits.
    pub fn from_b3(trace_id: &str, span_id: &str) -> Option<Self> {
        let trace_id = trace_id.trim();
        let span_id = span_id.trim();
        if trace_id.is_empty() || span_id.is_empty() || span_id.len() > 16 {
            return None;
        }
        let low_trace = if trace_id.len() > 16 {
            trace_id.get(trace_id.len() - 16..)?
        } else {
            trace_id
        };
        let trace_id = u64::from_str_radix(low_trace, 16).ok()?;
        let span_id = u64::from_str_radix(span_id, 16).ok()?;
        Some(Self::new(trace_id as i64, span_id as i64))
    }

    pub fn trace_id_hex(&self) -> String {
        format!("{:016x}", self.trace_id as u64)
    }

    pub fn span_id_hex(&self) -> String {
        format!("{:016x}", self.span_id as u64)
    }
}

impl Display for TraceContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.trace_id_hex(), self.span_id_hex())
    }
}
