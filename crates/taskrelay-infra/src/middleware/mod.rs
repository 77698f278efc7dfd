//! HTTP middleware

pub mod trace_scope;

pub use trace_scope::{trace_scope_middleware, B3_SPAN_ID_HEADER, B3_TRACE_ID_HEADER};
