pub mod changes;
pub mod fetch;
pub mod history;
pub mod init;
pub mod predictor;
pub mod reminders;
pub mod store;
pub mod subscriptions;
pub mod telegram;
