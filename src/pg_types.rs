/// PostgreSQL lock modes, their conflict matrix and what they block.
pub mod lock_modes;
/// Risk levels assigned to findings and the CI gate.
pub mod risk;
