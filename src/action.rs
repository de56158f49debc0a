//! The submit-action tag and the rules for resolving `PossibleUpdate`
//! into a concrete commit decision.

use derive_more::Display;

///
/// SubmitAction
///
/// Tags a tracked instance with what, if anything, must happen to it on
/// the next commit.
///

#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum SubmitAction {
    /// Not tracked for change.
    #[default]
    None,
    /// Must be inserted on next commit.
    Insert,
    /// Must be updated unconditionally.
    Update,
    /// Upsert.
    InsertOrUpdate,
    /// Tracked; commit decides insert-vs-skip based on modification detection.
    PossibleUpdate,
    /// Must be deleted.
    Delete,
}

impl SubmitAction {
    /// True for the two actions the table treats as "insert-shaped" for
    /// dependency ordering purposes.
    #[must_use]
    pub const fn is_insert_like(self) -> bool {
        matches!(self, Self::Insert | Self::InsertOrUpdate)
    }

    #[must_use]
    pub const fn is_delete(self) -> bool {
        matches!(self, Self::Delete)
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

/// Raw discriminant conversion, exercised at boundaries where an action
/// arrives as an out-of-range integer (e.g. from a foreign wire format)
/// rather than constructed by this crate's own API. In-process callers
/// who only ever build `SubmitAction` values through this enum can never
/// observe `InvalidAction`; it exists for exactly this boundary.
impl TryFrom<u8> for SubmitAction {
    type Error = crate::error::SessionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Insert),
            2 => Ok(Self::Update),
            3 => Ok(Self::InsertOrUpdate),
            4 => Ok(Self::PossibleUpdate),
            5 => Ok(Self::Delete),
            other => Err(crate::error::SessionError::invalid_action(format!(
                "unrecognized submit action discriminant: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_valid_discriminants() {
        for (n, expected) in [
            (0u8, SubmitAction::None),
            (1, SubmitAction::Insert),
            (2, SubmitAction::Update),
            (3, SubmitAction::InsertOrUpdate),
            (4, SubmitAction::PossibleUpdate),
            (5, SubmitAction::Delete),
        ] {
            assert_eq!(SubmitAction::try_from(n).unwrap(), expected);
        }
    }

    #[test]
    fn rejects_out_of_range_discriminant() {
        assert!(SubmitAction::try_from(6).is_err());
    }

    #[test]
    fn insert_like_classification() {
        assert!(SubmitAction::Insert.is_insert_like());
        assert!(SubmitAction::InsertOrUpdate.is_insert_like());
        assert!(!SubmitAction::Update.is_insert_like());
        assert!(!SubmitAction::PossibleUpdate.is_insert_like());
    }
}
