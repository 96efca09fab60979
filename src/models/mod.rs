mod resource;

pub use resource::{is_valid_id, Content, Resource};
