// Group-chat orchestration: turn policy, driver, statistics, run lifecycle and
// the observer feed. Agent replies arrive through the ReplyProvider trait.

pub mod driver;
pub mod feed;
pub mod handlers;
pub mod manager;
pub mod run;
pub mod stats;
pub mod transcript;
