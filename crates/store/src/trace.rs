//! Caller-supplied tracing context.
//!
//! Every store operation takes a [`TraceContext`] and opens its span as a child
//! of the context's span. The transport layer builds one per request and
//! passes it down explicitly.

use tracing::Span;

/// Parent span for store operations.
#[derive(Debug, Clone)]
pub struct TraceContext {
    span: Span,
}

impl TraceContext {
    /// Parent store spans on `span`.
    #[must_use]
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Parent store spans on the caller's current span.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Span::current())
    }

    /// Store spans become roots.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(Span::none())
    }

    /// The parent span.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }
}

impl From<Span> for TraceContext {
    fn from(span: Span) -> Self {
        Self::new(span)
    }
}
