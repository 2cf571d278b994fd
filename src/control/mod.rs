//! HTTP control surface.
//!
//! | Module   | Responsibility                                            |
//! |----------|-----------------------------------------------------------|
//! | `schema` | Per-route field declarations and capability verification |
//! | `api`    | Handlers, `ApiError` and the status mapping               |
//! | `server` | Router assembly, CORS in dev mode, graceful shutdown      |

pub mod api;
pub mod schema;
pub mod server;

pub use api::{ApiError, api_router};
pub use server::{ServerConfig, build_router, start_server};
