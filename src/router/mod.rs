//! # Router Module
//!
//! Dispatches a request to one handler by its normalized path.
//!
//! ## Overview
//!
//! Routes are exact matches on the path with the query string stripped. Anything
//! that matches no route goes to the fallback handler, which in the standard
//! table is static-file serving:
//!
//! | Path | Handler |
//! |---|---|
//! | `/status` | [`crate::handlers::StatusHandler`] |
//! | `/json-data` | [`crate::handlers::JsonStatusHandler`] |
//! | `/sse-stream` | [`crate::sse::SseStreamHandler`] |
//! | anything else | [`crate::handlers::StaticFileHandler`] |
//!
//! Handlers are independent objects behind the [`Handler`] trait; there is no
//! base-class fallback, the file handler is just the last entry in the table.
//!
//! ## Example
//!
//! ```rust
//! use obs_sse_server::handlers::JsonStatusHandler;
//! use obs_sse_server::router::Router;
//! use obs_sse_server::server::ParsedRequest;
//! use std::sync::Arc;
//!
//! let router = Router::new(Arc::new(JsonStatusHandler))
//!     .route("/json-data", Arc::new(JsonStatusHandler));
//! let res = router.dispatch(&ParsedRequest::get("/json-data?cache=1"));
//! assert_eq!(res.status, http::StatusCode::OK);
//! ```

mod core;

pub use self::core::{Handler, Router};
