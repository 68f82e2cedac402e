pub mod activity;
pub mod common;
pub mod notification;
pub mod participation;
pub mod skills;
pub mod volunteer;
