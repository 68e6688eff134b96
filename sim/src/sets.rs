use bevy::prelude::*;

/// Ordering of one simulation tick. Batches in `Sampling` and `Agents`
/// complete before the next set starts.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimUpdateSet {
    Clock,
    Sampling,
    Forces,
    Integrate,
    Agents,
    Report,
}
