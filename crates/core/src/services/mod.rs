//! Business logic services.

#![allow(missing_docs)]

pub mod comment;
pub mod follow;
pub mod group;
pub mod media;
pub mod post;
pub mod user;

pub use comment::{CommentInput, CommentService, CommentView};
pub use follow::{FollowResult, FollowService};
pub use group::{CreateGroupInput, GroupService};
pub use media::{ImageFormat, MediaService, validate_image};
pub use post::{ImageChange, PostInput, PostService, PostView};
pub use user::{Profile, SignupInput, UserService};
