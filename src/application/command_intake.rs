//! Inbound command intake
//!
//! Runs once per cycle before scraping. Pulls a batch of chat commands past
//! the persisted cursor, stages new targets, persists the target list and then
//! the cursor, and only then sends the replies.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::command::HELP_TEXT;
use crate::domain::{InboundCommand, TargetList, TrackerCommand, is_trackable_url};
use crate::infrastructure::notifier::{CommandSource, Notifier};
use crate::infrastructure::storage::{CursorStore, TargetStore};

/// Urls longer than this are shortened in `/list` replies.
const LIST_DISPLAY_CHARS: usize = 60;

/// What one intake run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeReport {
    /// Commands past the cursor, whatever became of them
    pub received: usize,
    /// Unauthorized senders and unrecognized text
    pub ignored: usize,
    pub added: Vec<String>,
    pub cursor: i64,
}

/// Result of applying one batch in memory, before anything is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedBatch {
    pub cursor: i64,
    pub received: usize,
    pub ignored: usize,
    pub added: Vec<String>,
    /// Replies to send once the batch is persisted, in command order
    pub replies: Vec<String>,
}

/// Apply `commands` to `targets`. Commands at or below `cursor` are dropped
/// and the returned cursor is the highest sequence seen.
pub fn stage_batch(
    commands: &[InboundCommand],
    cursor: i64,
    authorized_sender: &str,
    targets: &mut TargetList,
) -> StagedBatch {
    let mut batch = StagedBatch {
        cursor,
        ..StagedBatch::default()
    };

    for command in commands.iter().filter(|c| c.sequence > cursor) {
        batch.received += 1;
        batch.cursor = batch.cursor.max(command.sequence);

        if command.sender_id != authorized_sender {
            debug!(
                "Ignoring command {} from unauthorized sender '{}'",
                command.sequence, command.sender_id
            );
            batch.ignored += 1;
            continue;
        }

        match TrackerCommand::parse(&command.text) {
            Some(TrackerCommand::Add(url)) => {
                if !is_trackable_url(&url) {
                    info!("Rejected /add with invalid url '{}'", url);
                    batch
                        .replies
                        .push(format!("Not a valid link, it must start with http:// or https://\n\n{url}"));
                } else if targets.push(&url) {
                    info!("New target staged: {}", url);
                    batch.replies.push(format!(
                        "Link added!\n\n{url}\n\nTracking {} link(s) in total.",
                        targets.len()
                    ));
                    batch.added.push(url);
                } else {
                    debug!("Target already tracked: {}", url);
                    batch.replies.push(format!("This link is already tracked.\n\n{url}"));
                }
            }
            Some(TrackerCommand::List) => batch.replies.push(list_reply(targets)),
            Some(TrackerCommand::Help) => batch.replies.push(HELP_TEXT.to_string()),
            None => {
                debug!("Ignoring unrecognized command {}", command.sequence);
                batch.ignored += 1;
            }
        }
    }

    batch
}

fn list_reply(targets: &TargetList) -> String {
    if targets.is_empty() {
        return "No links are tracked yet.".to_string();
    }

    let mut message = String::from("Tracked links:\n\n");
    for (index, url) in targets.iter().enumerate() {
        let display = if url.chars().count() <= LIST_DISPLAY_CHARS {
            url.to_string()
        } else {
            let head: String = url.chars().take(LIST_DISPLAY_CHARS - 3).collect();
            format!("{head}...")
        };
        message.push_str(&format!("{}. {}\n", index + 1, display));
    }
    message.push_str(&format!("\nTotal: {} link(s)", targets.len()));
    message
}

pub struct CommandIntake {
    source: Arc<dyn CommandSource>,
    notifier: Arc<dyn Notifier>,
    target_store: TargetStore,
    cursor_store: CursorStore,
    authorized_sender: String,
    poll_limit: u32,
}

impl CommandIntake {
    pub fn new(
        source: Arc<dyn CommandSource>,
        notifier: Arc<dyn Notifier>,
        target_store: TargetStore,
        cursor_store: CursorStore,
        authorized_sender: impl Into<String>,
        poll_limit: u32,
    ) -> Self {
        Self {
            source,
            notifier,
            target_store,
            cursor_store,
            authorized_sender: authorized_sender.into(),
            poll_limit,
        }
    }

    /// Pull and apply one batch. Never fails the cycle: an unreadable cursor,
    /// an unreachable inbox or an unwritable target list all leave the cursor
    /// where it was, so the same commands are seen again next run.
    pub async fn run(&self, targets: &mut TargetList) -> IntakeReport {
        let cursor = match self.cursor_store.load().await {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!("Skipping command intake, cursor unreadable: {}", e);
                return IntakeReport::default();
            }
        };

        let commands = match self.source.poll(cursor, self.poll_limit).await {
            Ok(commands) => commands,
            Err(e) => {
                warn!("Polling inbound commands failed: {}", e);
                return IntakeReport {
                    cursor,
                    ..IntakeReport::default()
                };
            }
        };

        let mut staged_targets = targets.clone();
        let batch = stage_batch(&commands, cursor, &self.authorized_sender, &mut staged_targets);
        if batch.received == 0 {
            debug!("No new inbound commands after {}", cursor);
            return IntakeReport {
                cursor,
                ..IntakeReport::default()
            };
        }

        if !batch.added.is_empty() {
            if let Err(e) = self.target_store.save(&staged_targets).await {
                warn!("Keeping cursor at {}, target list not saved: {}", cursor, e);
                return IntakeReport {
                    cursor,
                    ..IntakeReport::default()
                };
            }
        }
        *targets = staged_targets;

        let cursor = match self.cursor_store.save(batch.cursor).await {
            Ok(()) => batch.cursor,
            Err(e) => {
                warn!("Failed to persist command cursor {}: {}", batch.cursor, e);
                cursor
            }
        };

        for reply in &batch.replies {
            if let Err(e) = self.notifier.send_text(reply).await {
                warn!("Failed to send command reply: {}", e);
            }
        }

        info!(
            "Command intake: {} received, {} ignored, {} target(s) added, cursor now {}",
            batch.received,
            batch.ignored,
            batch.added.len(),
            cursor
        );

        IntakeReport {
            received: batch.received,
            ignored: batch.ignored,
            added: batch.added,
            cursor,
        }
    }
}
