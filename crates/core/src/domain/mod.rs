pub mod advertisement;
pub mod content;
pub mod request;
pub mod targeting;
