pub mod api;
pub mod models;
pub mod slug;

pub use models::{Role, SessionUser};
pub use slug::{is_reserved, slugify};
