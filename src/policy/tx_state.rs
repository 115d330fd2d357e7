use fxhash::FxHashMap;

use crate::pg_types::lock_modes::LockMode;

/// What [TransactionState::record_lock] derived while recording.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockRecorded {
    /// The transaction now holds ACCESS EXCLUSIVE on two distinct tables.
    pub wide_lock_window: bool,
    /// Another table already under ACCESS EXCLUSIVE when this one was locked.
    pub previous_table: Option<String>,
}

/// Live state of the policy engine while walking one file's statements.
/// Tables are keyed case-folded; only the strongest lock per table is kept.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransactionState {
    depth: u32,
    savepoints: Vec<String>,
    locks: FxHashMap<String, LockMode>,
    snapshots: FxHashMap<String, FxHashMap<String, LockMode>>,
    statements_in_tx: usize,
}

impl TransactionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `active` iff depth > 0.
    pub fn active(&self) -> bool {
        self.depth > 0
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn statements_in_tx(&self) -> usize {
        self.statements_in_tx
    }

    pub fn statement_seen(&mut self) {
        if self.active() {
            self.statements_in_tx += 1;
        }
    }

    pub fn begin(&mut self) {
        self.depth += 1;
    }

    pub fn commit(&mut self) {
        self.end_transaction();
    }

    pub fn rollback(&mut self) {
        self.end_transaction();
    }

    fn end_transaction(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.reset();
        }
    }

    /// Clear all transaction-scoped state back to the initial value.
    pub fn reset(&mut self) {
        self.depth = 0;
        self.savepoints.clear();
        self.locks.clear();
        self.snapshots.clear();
        self.statements_in_tx = 0;
    }

    pub fn savepoint(&mut self, name: &str) {
        self.savepoints.push(name.to_string());
        self.snapshots.insert(name.to_string(), self.locks.clone());
    }

    /// RELEASE pops the savepoint and everything above it; held locks stay.
    pub fn release(&mut self, name: &str) {
        if let Some(pos) = self.savepoints.iter().position(|s| s == name) {
            for discarded in self.savepoints.drain(pos..) {
                self.snapshots.remove(&discarded);
            }
        }
    }

    /// ROLLBACK TO pops savepoints strictly above `name` and restores the
    /// lock map from its snapshot. The savepoint itself stays usable.
    pub fn rollback_to(&mut self, name: &str) {
        if let Some(pos) = self.savepoints.iter().position(|s| s == name) {
            for discarded in self.savepoints.drain(pos + 1..) {
                self.snapshots.remove(&discarded);
            }
            if let Some(snapshot) = self.snapshots.get(name) {
                self.locks = snapshot.clone();
            }
        }
    }

    /// Record a lock, keeping only the strongest mode per table, and report
    /// whether this opened a wide lock window.
    pub fn record_lock(&mut self, table: &str, mode: LockMode) -> LockRecorded {
        let table = table.to_lowercase();
        let mut result = LockRecorded::default();
        if mode == LockMode::AccessExclusive {
            result.previous_table = self
                .access_exclusive_tables()
                .into_iter()
                .find(|held| held != &table);
            result.wide_lock_window = result.previous_table.is_some();
        }
        self.locks
            .entry(table)
            .and_modify(|held| {
                if mode > *held {
                    *held = mode;
                }
            })
            .or_insert(mode);
        result
    }

    pub fn lock_on(&self, table: &str) -> Option<LockMode> {
        self.locks.get(&table.to_lowercase()).copied()
    }

    /// The subset of the lock map held at ACCESS EXCLUSIVE, sorted for
    /// deterministic messages.
    pub fn access_exclusive_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self
            .locks
            .iter()
            .filter(|(_, mode)| **mode == LockMode::AccessExclusive)
            .map(|(table, _)| table.clone())
            .collect();
        tables.sort();
        tables
    }

    pub fn holds_access_exclusive(&self) -> bool {
        self.locks
            .values()
            .any(|mode| *mode == LockMode::AccessExclusive)
    }
}
