pub mod activities;
pub mod candidates;
pub mod dashboard;
pub mod database;
pub mod mailer;
pub mod matching;
pub mod notifier;
pub mod participation;
pub mod volunteers;
