//! Database repositories.

mod comment;
mod follow;
mod group;
mod post;
mod user;

pub use comment::CommentRepository;
pub use follow::FollowRepository;
pub use group::GroupRepository;
pub use post::{PostRepository, PostScope};
pub use user::UserRepository;
