pub mod email_sender;
pub mod fake_renderer;
pub mod fanout_notifier;
pub mod fs_snapshot_store;
pub mod memory_store;
pub mod scheduler;
pub mod sqlite_store;
pub mod telegram_sender;
pub mod webdriver_renderer;
pub mod webhook_sender;
