use crate::error::{Invariant, SelectionError};

/// Nesting depth plus the sibling group of every open level.
///
/// Each time a level is entered it receives a fresh group id, so positional
/// counters restart for every parent element.
#[derive(Clone, Debug)]
pub(crate) struct NestingLevels {
    level: usize,
    group_of_level: Vec<usize>,
    last_group: usize,
}

impl NestingLevels {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            level: 0,
            group_of_level: vec![0],
            last_group: 0,
        }
    }

    #[inline]
    pub(crate) const fn level(&self) -> usize {
        self.level
    }

    /// Sibling group of the current level.
    #[inline]
    pub(crate) fn sibling_group(&self) -> usize {
        self.group_of_level.get(self.level).copied().unwrap_or_default()
    }

    /// Descend below an element whose start tag just ended.
    pub(crate) fn enter(&mut self) {
        self.level = self.level.saturating_add(1);
        self.last_group = self.last_group.saturating_add(1);
        if let Some(group) = self.group_of_level.get_mut(self.level) {
            *group = self.last_group;
        } else {
            self.group_of_level.resize(self.level, 0);
            self.group_of_level.push(self.last_group);
        }
    }

    /// Step back up for a closing tag and return the level of the element being closed.
    pub(crate) fn exit(&mut self) -> Result<usize, SelectionError> {
        self.level = self
            .level
            .checked_sub(1)
            .ok_or(SelectionError::InvariantViolation(Invariant::LevelUnderflow))?;
        Ok(self.level)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Assertions in tests are expected")]
mod tests {
    use super::*;

    #[test]
    fn reentered_levels_get_fresh_groups() {
        let mut levels = NestingLevels::new();
        assert_eq!(levels.sibling_group(), 0);
        levels.enter();
        let first = levels.sibling_group();
        assert_eq!(levels.exit().unwrap(), 0);
        levels.enter();
        assert_ne!(levels.sibling_group(), first);
        assert_eq!(levels.level(), 1);
    }

    #[test]
    fn exit_at_root_is_rejected() {
        let mut levels = NestingLevels::new();
        assert!(matches!(
            levels.exit(),
            Err(SelectionError::InvariantViolation(Invariant::LevelUnderflow))
        ));
        assert_eq!(levels.level(), 0);
    }
}
