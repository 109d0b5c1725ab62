use std::sync::Arc;

use platwrap_config::RequestContext;

use crate::transport::HttpTransport;

#[derive(Clone)]
struct BaseTransport(Arc<dyn HttpTransport>);

#[derive(Clone)]
struct EventName(String);

/// Attach a base transport for API clients built from this context.
pub fn with_transport(ctx: &RequestContext, transport: Arc<dyn HttpTransport>) -> RequestContext {
    ctx.with_value(BaseTransport(transport))
}

pub fn transport_from_context(ctx: &RequestContext) -> Option<Arc<dyn HttpTransport>> {
    ctx.value::<BaseTransport>().map(|t| t.0.clone())
}

/// Attach the event name sent with API requests.
pub fn with_event_name(ctx: &RequestContext, name: impl Into<String>) -> RequestContext {
    ctx.with_value(EventName(name.into()))
}

pub fn event_name_from_context(ctx: &RequestContext) -> Option<&str> {
    ctx.value::<EventName>()
        .map(|e| e.0.as_str())
        .filter(|s| !s.is_empty())
}
