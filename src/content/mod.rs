// Content repository core: uniform caching, authorization and vote
// bookkeeping over posts and comments, plus the identity service.
pub mod authorize;
pub mod comments;
pub mod model;
pub mod posts;
pub mod users;
pub mod vote;

pub use comments::CommentService;
pub use posts::PostService;
pub use users::UserService;
