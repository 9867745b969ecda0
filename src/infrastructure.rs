//! Infrastructure layer: page access, extraction, persistence and messaging
//!
//! Everything that touches the network or the filesystem lives here behind
//! the traits the application layer depends on.

pub mod browser;
pub mod config;
pub mod logging;
pub mod notifier;
pub mod parsing;
pub mod parsing_error;
pub mod storage;
pub mod telegram;

// Re-export commonly used items
pub use browser::{BrowserDriver, BrowserError, HttpPageSource, PageSource, SnapshotBrowser, StaticPageSource};
pub use config::{AppConfig, ConfigManager};
pub use logging::{get_log_directory, init_logging_with_config};
pub use notifier::{CommandSource, LogNotifier, Notifier, TransportError};
pub use parsing::{ExtractionContext, ExtractionError, SiteDispatcher, StrategyOutcome};
pub use storage::{CursorStore, LedgerStore, StorageError, TargetStore};
pub use telegram::TelegramClient;
