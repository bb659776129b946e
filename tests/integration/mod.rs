//! Integration tests for the Sprig file-browser engine

mod cli;
mod drag_and_drop;
mod expansion_persistence;
mod file_operations;
mod reconciliation;
mod support;
