//! HTML front end for Quill.
//!
//! This crate turns the core services into a server-rendered site:
//!
//! - **Endpoints**: feeds, post authoring, comments, follows and auth pages
//! - **Extractors**: session user, post form (multipart or urlencoded)
//! - **Middleware**: session lookup, error page rendering
//! - **Cache**: short-lived page cache for the index feed
//! - **Pages**: ructe templates compiled from `templates/` at build time
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod cache;
pub mod endpoints;
pub mod extractors;
pub mod forms;
pub mod middleware;
pub mod pages;
pub mod response;

include!(concat!(env!("OUT_DIR"), "/templates.rs"));

pub use cache::PageCache;
pub use endpoints::router;
pub use middleware::AppState;
