use pmctk_ids::{Id, IdRange};

use crate::{ModelError, StateId, Weight};

/// A sparse matrix in compressed row form with [`StateId`] rows and columns.
///
/// Each row is kept sorted by column and contains every column at most once.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix<V> {
    row_starts: Vec<usize>,
    entries: Vec<(StateId, V)>,
    column_count: usize,
}

impl<V: Weight> SparseMatrix<V> {
    /// Builds a matrix from per-row entry lists.
    ///
    /// Entries of a row can be given in any order, entries for the same column are summed.
    pub fn from_rows<R>(
        column_count: usize,
        rows: impl IntoIterator<Item = R>,
    ) -> Result<Self, ModelError>
    where
        R: IntoIterator<Item = (StateId, V)>,
    {
        let mut row_starts = vec![0];
        let mut entries: Vec<(StateId, V)> = vec![];

        for (row_index, row) in rows.into_iter().enumerate() {
            let row_start = entries.len();
            for (column, value) in row {
                if column.id_index() >= column_count {
                    return Err(ModelError::TargetOutOfRange {
                        from: StateId::from_id_index(row_index),
                        to: column,
                        states: column_count,
                    });
                }
                entries.push((column, value));
            }

            entries[row_start..].sort_by_key(|&(column, _)| column);

            // Merge duplicate columns in place
            let mut write = row_start;
            for read in row_start..entries.len() {
                if write > row_start && entries[write - 1].0 == entries[read].0 {
                    let value = std::mem::replace(&mut entries[read].1, V::zero());
                    entries[write - 1].1 += &value;
                } else {
                    entries.swap(write, read);
                    write += 1;
                }
            }
            entries.truncate(write);

            row_starts.push(entries.len());
        }

        Ok(Self {
            row_starts,
            entries,
            column_count,
        })
    }

    /// Returns the transposed matrix.
    ///
    /// For a transition matrix this is the backward transition relation: row `t` lists every
    /// `(s, w)` such that the original row `s` contains `(t, w)`. Rows of the result are sorted
    /// since source rows are visited in order.
    pub fn transpose(&self) -> Self {
        let mut row_starts = vec![0; self.column_count + 1];
        for &(column, _) in &self.entries {
            row_starts[column.id_index() + 1] += 1;
        }
        for i in 0..self.column_count {
            row_starts[i + 1] += row_starts[i];
        }

        let mut fill = row_starts.clone();
        let mut slots: Vec<Option<(StateId, V)>> = vec![None; self.entries.len()];

        for row in self.row_ids() {
            for (column, value) in self.row(row) {
                let slot = &mut fill[column.id_index()];
                slots[*slot] = Some((row, value.clone()));
                *slot += 1;
            }
        }

        Self {
            row_starts,
            entries: slots.into_iter().flatten().collect(),
            column_count: self.row_count(),
        }
    }
}

impl<V> SparseMatrix<V> {
    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.row_starts.len() - 1
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Total number of stored entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// The ids of all rows.
    pub fn row_ids(&self) -> IdRange<StateId> {
        IdRange::from_index_range(0..self.row_count())
    }

    /// Returns the entries of a row, sorted by column.
    #[track_caller]
    pub fn row(&self, row: StateId) -> &[(StateId, V)] {
        let index = row.id_index();
        &self.entries[self.row_starts[index]..self.row_starts[index + 1]]
    }
}
