use serde::Serialize;

use crate::pg_types::lock_modes::LockMode::*;

/// A table lock mode in PostgreSQL, ordered from least to most restrictive.
/// See [the documentation](https://www.postgresql.org/docs/current/explicit-locking.html)
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash, Serialize)]
pub enum LockMode {
    AccessShare,
    RowShare,
    RowExclusive,
    ShareUpdateExclusive,
    Share,
    ShareRowExclusive,
    Exclusive,
    AccessExclusive,
}

/// All lock modes in PostgreSQL
pub const LOCK_MODES: [LockMode; 8] = [
    AccessShare,
    RowShare,
    RowExclusive,
    ShareUpdateExclusive,
    Share,
    ShareRowExclusive,
    Exclusive,
    AccessExclusive,
];

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_sql_str())
    }
}

/// What an acquired lock mode blocks for everyone else. Derived from the
/// conflict matrix: reads probe ACCESS SHARE, writes probe ROW EXCLUSIVE,
/// other DDL probes ACCESS EXCLUSIVE.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash, Serialize)]
pub struct BlockedOperations {
    pub reads: bool,
    pub writes: bool,
    pub other_ddl: bool,
}

impl LockMode {
    /// The spelling used in `LOCK TABLE ... IN <mode> MODE` and in reports.
    pub fn as_sql_str(&self) -> &'static str {
        match self {
            AccessShare => "ACCESS SHARE",
            RowShare => "ROW SHARE",
            RowExclusive => "ROW EXCLUSIVE",
            ShareUpdateExclusive => "SHARE UPDATE EXCLUSIVE",
            Share => "SHARE",
            ShareRowExclusive => "SHARE ROW EXCLUSIVE",
            Exclusive => "EXCLUSIVE",
            AccessExclusive => "ACCESS EXCLUSIVE",
        }
    }

    /// The spelling used in the `pg_locks.mode` column.
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AccessShare => "AccessShareLock",
            RowShare => "RowShareLock",
            RowExclusive => "RowExclusiveLock",
            ShareUpdateExclusive => "ShareUpdateExclusiveLock",
            Share => "ShareLock",
            ShareRowExclusive => "ShareRowExclusiveLock",
            Exclusive => "ExclusiveLock",
            AccessExclusive => "AccessExclusiveLock",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        LOCK_MODES.iter().copied().find(|m| m.to_db_str() == s)
    }

    /// What lock modes this lock mode conflicts with.
    pub fn conflicts_with(&self) -> &'static [LockMode] {
        match self {
            AccessShare => &[AccessExclusive],
            RowShare => &[Exclusive, AccessExclusive],
            RowExclusive => &[Share, ShareRowExclusive, Exclusive, AccessExclusive],
            ShareUpdateExclusive => &[
                ShareUpdateExclusive,
                Share,
                ShareRowExclusive,
                Exclusive,
                AccessExclusive,
            ],
            Share => &[
                RowExclusive,
                ShareUpdateExclusive,
                ShareRowExclusive,
                Exclusive,
                AccessExclusive,
            ],
            ShareRowExclusive => &[
                RowExclusive,
                ShareUpdateExclusive,
                Share,
                ShareRowExclusive,
                Exclusive,
                AccessExclusive,
            ],
            Exclusive => &[
                RowShare,
                RowExclusive,
                ShareUpdateExclusive,
                Share,
                ShareRowExclusive,
                Exclusive,
                AccessExclusive,
            ],
            AccessExclusive => &LOCK_MODES,
        }
    }

    fn conflicts_with_mode(&self, other: LockMode) -> bool {
        self.conflicts_with().contains(&other)
    }

    /// Plain `SELECT` needs ACCESS SHARE.
    pub fn blocks_reads(&self) -> bool {
        self.conflicts_with_mode(AccessShare)
    }

    /// `INSERT`/`UPDATE`/`DELETE`/`MERGE` need ROW EXCLUSIVE.
    pub fn blocks_writes(&self) -> bool {
        self.conflicts_with_mode(RowExclusive)
    }

    /// Most DDL needs ACCESS EXCLUSIVE.
    pub fn blocks_other_ddl(&self) -> bool {
        self.conflicts_with_mode(AccessExclusive)
    }

    pub fn blocked_operations(&self) -> BlockedOperations {
        BlockedOperations {
            reads: self.blocks_reads(),
            writes: self.blocks_writes(),
            other_ddl: self.blocks_other_ddl(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn conflict_matrix_is_symmetric() {
        for a in LOCK_MODES {
            for b in LOCK_MODES {
                assert_eq!(
                    a.conflicts_with().contains(&b),
                    b.conflicts_with().contains(&a),
                    "asymmetric conflict between {a:?} and {b:?}"
                );
            }
        }
    }

    #[test]
    fn blocked_triple_matches_conflict_probes() {
        for mode in LOCK_MODES {
            assert_eq!(
                mode.blocks_reads(),
                mode.conflicts_with().contains(&AccessShare)
            );
            assert_eq!(
                mode.blocks_writes(),
                mode.conflicts_with().contains(&RowExclusive)
            );
            assert_eq!(
                mode.blocks_other_ddl(),
                mode.conflicts_with().contains(&AccessExclusive)
            );
        }
    }

    #[test]
    fn access_exclusive_blocks_everything() {
        let blocked = AccessExclusive.blocked_operations();
        assert!(blocked.reads && blocked.writes && blocked.other_ddl);
    }

    #[test]
    fn share_blocks_writes_but_not_reads() {
        assert!(Share.blocks_writes());
        assert!(!Share.blocks_reads());
    }

    #[test]
    fn share_update_exclusive_only_blocks_ddl() {
        assert!(!ShareUpdateExclusive.blocks_reads());
        assert!(!ShareUpdateExclusive.blocks_writes());
        assert!(ShareUpdateExclusive.blocks_other_ddl());
    }

    #[test]
    fn ordering_is_least_to_most_restrictive() {
        assert!(AccessShare < RowShare);
        assert!(Share < ShareRowExclusive);
        assert!(Exclusive < AccessExclusive);
    }

    #[test]
    fn db_str_round_trips() {
        for mode in LOCK_MODES {
            assert_eq!(LockMode::from_db_str(mode.to_db_str()), Some(mode));
        }
    }
}
