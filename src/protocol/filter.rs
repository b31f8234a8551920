use crate::core::{MASTER_GROUP, MY_GROUP};

/// Decides whether a light-control command is meant for this node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupFilter {
    local_group: u16,
}

impl Default for GroupFilter {
    fn default() -> Self {
        GroupFilter::new(MY_GROUP)
    }
}

impl GroupFilter {
    pub fn new(local_group: u16) -> Self {
        GroupFilter { local_group }
    }

    pub fn local_group(&self) -> u16 {
        self.local_group
    }

    /// The master group addresses everyone; otherwise the group must match ours.
    pub fn applies(&self, group_id: u16) -> bool {
        group_id == MASTER_GROUP || group_id == self.local_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UNKNOWN_GROUP;

    #[test]
    fn test_applies_to_master_and_local_group() {
        let filter = GroupFilter::default();
        assert_eq!(filter.local_group(), 1);
        for group in 0..=u16::MAX {
            assert_eq!(filter.applies(group), group == 0 || group == 1, "group {}", group);
        }
    }

    #[test]
    fn test_unknown_group_never_applies() {
        assert!(!GroupFilter::default().applies(UNKNOWN_GROUP));
        assert!(GroupFilter::new(7).applies(7));
        assert!(!GroupFilter::new(7).applies(1));
    }
}
