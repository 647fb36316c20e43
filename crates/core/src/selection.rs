use std::collections::HashSet;

use crate::table_data::RowId;

/// Rows checked in the grid. Scoped to one loaded page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSelection {
    selected: HashSet<RowId>,
}

impl RowSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the row is selected afterwards.
    pub fn toggle(&mut self, row_id: RowId) -> bool {
        if self.selected.remove(&row_id) {
            false
        } else {
            self.selected.insert(row_id);
            true
        }
    }

    pub fn select_all<I>(&mut self, row_ids: I)
    where
        I: IntoIterator<Item = RowId>,
    {
        self.selected = row_ids.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    #[must_use]
    pub fn contains(&self, row_id: &RowId) -> bool {
        self.selected.contains(row_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowId> {
        self.selected.iter()
    }

    /// Selected ids in a stable order, for handing to delete actions.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<RowId> {
        let mut ids = self.selected.iter().cloned().collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::RowSelection;
    use crate::table_data::RowId;

    #[test]
    fn toggle_twice_restores_previous_state() {
        let mut selection = RowSelection::new();
        selection.toggle(RowId::from("r1"));
        let before = selection.clone();

        assert!(selection.toggle(RowId::from("r2")));
        assert!(!selection.toggle(RowId::from("r2")));
        assert_eq!(selection, before);
    }

    #[test]
    fn select_all_replaces_previous_selection() {
        let mut selection = RowSelection::new();
        selection.toggle(RowId::from("stale"));

        selection.select_all(["r1", "r2", "r3"].map(RowId::from));

        assert_eq!(selection.len(), 3);
        assert!(!selection.contains(&RowId::from("stale")));
        assert_eq!(
            selection.sorted_ids(),
            vec![RowId::from("r1"), RowId::from("r2"), RowId::from("r3")]
        );
    }
}
