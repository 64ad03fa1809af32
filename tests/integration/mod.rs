//! End-to-end scenarios across locator, optimistic engine, executor and attachments.

mod attachments;
mod content_migration;
mod last_call_wins;
mod optimistic_rollback;
mod support;
