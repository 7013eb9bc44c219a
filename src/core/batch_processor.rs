//! Concurrent command processing with account-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which runs a chunk of
//! commands concurrently on the tokio blocking pool while keeping the file
//! order of commands that share a primary account.
//!
//! # Design
//!
//! A chunk is split into segments at lifecycle commands (`open`,
//! `deactivate`). Lifecycle commands run alone and in order, so every money
//! command sees exactly the accounts opened or deactivated before it in the
//! file. Each run of money commands between two lifecycle commands is
//! partitioned by primary account; partitions run concurrently and the
//! executor's account locks order the ones that touch the same accounts.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── Arc<LedgerEngine>  (shared command engine)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::error;

use super::engine::LedgerEngine;
use crate::types::{AccountId, Command, LedgerError};

/// Result of applying a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The command that was applied
    pub command: Command,

    /// The outcome (success or error)
    pub result: Result<(), LedgerError>,
}

/// Batch processor with account-based partitioning
#[derive(Clone)]
pub struct BatchProcessor {
    engine: Arc<LedgerEngine>,
}

impl BatchProcessor {
    /// Create a new BatchProcessor over a shared engine
    pub fn new(engine: Arc<LedgerEngine>) -> Self {
        Self { engine }
    }

    /// The shared engine
    pub fn engine(&self) -> &Arc<LedgerEngine> {
        &self.engine
    }

    /// Partition money commands by primary account
    ///
    /// Each command appears in exactly one partition, and commands of one
    /// partition keep their original order.
    pub fn partition_by_account(&self, commands: Vec<Command>) -> HashMap<AccountId, Vec<Command>> {
        let mut partitions: HashMap<AccountId, Vec<Command>> = HashMap::new();

        for command in commands {
            partitions
                .entry(command.primary_account())
                .or_default()
                .push(command);
        }

        partitions
    }

    /// Apply commands one after another in the given order
    pub fn process_sequential(&self, commands: Vec<Command>) -> Vec<ProcessingResult> {
        commands
            .into_iter()
            .map(|command| {
                let result = self.engine.apply(&command);
                ProcessingResult { command, result }
            })
            .collect()
    }

    /// Process a chunk of commands
    ///
    /// Results of one partition are in input order; results of different
    /// partitions may interleave in any order. A command that draws on funds
    /// credited by another partition in the same run may fail where
    /// [`process_sequential`](Self::process_sequential) would succeed.
    pub async fn process_batch(&self, batch: Vec<Command>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(batch.len());
        let mut run = Vec::new();

        for command in batch {
            if command.is_lifecycle() {
                results.extend(self.process_concurrent(std::mem::take(&mut run)).await);
                results.extend(self.run_blocking(vec![command]).await);
            } else {
                run.push(command);
            }
        }
        results.extend(self.process_concurrent(run).await);

        results
    }

    async fn process_concurrent(&self, run: Vec<Command>) -> Vec<ProcessingResult> {
        if run.is_empty() {
            return Vec::new();
        }

        let mut tasks = Vec::new();
        for (_account, commands) in self.partition_by_account(run) {
            let processor = self.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                processor.process_sequential(commands)
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(partition_results) => results.extend(partition_results),
                Err(e) => error!(error = %e, "command partition panicked"),
            }
        }
        results
    }

    async fn run_blocking(&self, commands: Vec<Command>) -> Vec<ProcessingResult> {
        let processor = self.clone();
        match tokio::task::spawn_blocking(move || processor.process_sequential(commands)).await {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, "lifecycle command panicked");
                Vec::new()
            }
        }
    }
}
