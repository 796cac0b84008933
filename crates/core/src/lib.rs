//! Core business logic for Quill.

pub mod pagination;
pub mod services;

pub use pagination::{POSTS_PER_PAGE, Page, PageRequest};
pub use services::*;
