//! The `original` slot of a tracked item: a tagged union capturing
//! which change-detection strategy is in play for that instance.

///
/// Original
///
/// `Absent` means the subscription strategy is in effect (the
/// instance's change-notification hook will supply an original the
/// moment a mutation is signalled). `Snapshot` holds a clone taken at
/// tracking time for the compare-at-commit strategy. Exactly one of
/// "snapshot present" / "subscribed" holds for any `PossibleUpdate`
/// item (spec §3 invariant 2).
///

#[derive(Clone, Debug)]
pub enum Original<E> {
    Absent,
    Snapshot(E),
}

impl<E> Original<E> {
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    #[must_use]
    pub const fn as_snapshot(&self) -> Option<&E> {
        match self {
            Self::Snapshot(value) => Some(value),
            Self::Absent => None,
        }
    }
}
