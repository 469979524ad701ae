//! All Paths are recorded here for use throughout this codebase
pub mod base {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const ABOUT: &str = "/about";
}

pub const SYNC: &str = "/sync";

pub mod users {
    pub const TRAFFIC: &str = "/users/{user_id}/traffic";
}

pub mod admin {
    pub const TRAFFIC: &str = "/admin/traffic";
    pub const USERS: &str = "/admin/users";
    pub const NODES: &str = "/admin/nodes";
    pub const EVENTS: &str = "/admin/events";
}

pub fn user_traffic_path(user_id: &str) -> String {
    users::TRAFFIC.replace("{user_id}", user_id)
}
