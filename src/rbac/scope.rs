use serde::Serialize;
use std::collections::BTreeSet;

use crate::auth::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ClassAssignment {
    pub class_id: i32,
    pub subject_id: i32,
}

/// Rows a granted caller may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataScope {
    All,
    Restricted {
        students: BTreeSet<i32>,
        classes: BTreeSet<ClassAssignment>,
    },
}

impl DataScope {
    pub fn nothing() -> Self {
        DataScope::Restricted {
            students: BTreeSet::new(),
            classes: BTreeSet::new(),
        }
    }

    pub fn students(ids: impl IntoIterator<Item = i32>) -> Self {
        DataScope::Restricted {
            students: ids.into_iter().collect(),
            classes: BTreeSet::new(),
        }
    }

    pub fn classes(pairs: impl IntoIterator<Item = ClassAssignment>) -> Self {
        DataScope::Restricted {
            students: BTreeSet::new(),
            classes: pairs.into_iter().collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, DataScope::All)
    }

    pub fn permits_student(&self, student_id: i32) -> bool {
        match self {
            DataScope::All => true,
            DataScope::Restricted { students, .. } => students.contains(&student_id),
        }
    }

    pub fn permits_class(&self, class_id: i32) -> bool {
        match self {
            DataScope::All => true,
            DataScope::Restricted { classes, .. } => classes.iter().any(|a| a.class_id == class_id),
        }
    }

    /// Keep only the ids this scope may see, preserving input order.
    pub fn narrow_students<I>(&self, ids: I) -> Vec<i32>
    where
        I: IntoIterator<Item = i32>,
    {
        ids.into_iter().filter(|id| self.permits_student(*id)).collect()
    }

    /// Out-of-scope records are reported as absent, never as forbidden.
    pub fn ensure_student_visible(&self, student_id: i32) -> Result<(), AuthError> {
        if self.permits_student(student_id) {
            Ok(())
        } else {
            Err(AuthError::NotFound)
        }
    }

    /// Union of two role contributions.
    pub fn merge(self, other: DataScope) -> DataScope {
        match (self, other) {
            (DataScope::All, _) | (_, DataScope::All) => DataScope::All,
            (
                DataScope::Restricted { mut students, mut classes },
                DataScope::Restricted {
                    students: more_students,
                    classes: more_classes,
                },
            ) => {
                students.extend(more_students);
                classes.extend(more_classes);
                DataScope::Restricted { students, classes }
            }
        }
    }
}
