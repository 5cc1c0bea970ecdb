pub mod excerpt;
pub mod feeds;
pub mod posts;
pub mod rate_limit;
pub mod sanitize;
pub mod slug;
