//! Endpoint paths shared by the client and the development server.

/// Push channel. The access credential travels in the [`TOKEN_QUERY_PARAM`] query parameter.
pub const STREAM_PATH: &str = "/api/notifications/stream";

/// Query parameter carrying the access credential on the push channel request.
pub const TOKEN_QUERY_PARAM: &str = "token";

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// Snapshot: number of orders awaiting processing.
pub const PENDING_ORDERS_COUNT_PATH: &str = "/api/orders/count/pending";

/// Snapshot: number of call requests nobody has picked up yet.
pub const NEW_CALL_REQUESTS_COUNT_PATH: &str = "/api/call-requests/count/new";

/// Development only: publish an event to every open push channel.
pub const DEV_EVENTS_PATH: &str = "/api/dev/events";
