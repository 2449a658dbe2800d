//! Swapping a nested code unit inside its parent
//!
//! Instrumenting a function nested inside a module (or a class, or another function) means
//! rebuilding every code unit on the path from the module down to that function: each parent
//! holds its children in its constants pool. [`replace_nested`] performs one step of that walk.
//! The caller drives the walk upwards, feeding the returned parent in as the `replacement` of the
//! next step.

use super::constant::TupleDisplay;
use super::{CodeUnit, Constant};
use std::sync::Arc;

/// Where (if anywhere) a nested code unit sits in a parent's constants pool
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NestedLookup {
    /// Index into the constants pool
    Found(usize),
    NotFound,
}

impl CodeUnit {
    /// Find the first constant which is a code unit equal to `original`
    ///
    /// The comparison is structural, so when two identical nested code units sit in the same pool,
    /// the first one is always the one found.
    pub fn find_nested(&self, original: &CodeUnit) -> NestedLookup {
        self.constants()
            .iter()
            .position(|constant| match constant {
                Constant::Code(nested) => **nested == *original,
                _ => false,
            })
            .map_or(NestedLookup::NotFound, NestedLookup::Found)
    }
}

/// Something that happened while substituting a nested code unit
#[derive(Copy, Clone, Debug)]
pub enum SubstitutionEvent<'a> {
    Searching {
        parent: &'a CodeUnit,
        original: &'a CodeUnit,
        replacement: &'a CodeUnit,
    },
    NotFound {
        parent: &'a CodeUnit,
        original: &'a CodeUnit,
    },
    Replaced {
        new_parent: &'a CodeUnit,
        index: usize,
    },
}

/// Sink for substitution events
pub trait Diagnostics {
    fn report(&mut self, event: SubstitutionEvent<'_>);
}

/// Forwards substitution events to the `log` facade at debug level
#[derive(Copy, Clone, Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&mut self, event: SubstitutionEvent<'_>) {
        match event {
            SubstitutionEvent::Searching {
                parent,
                original,
                replacement,
            } => log::debug!(
                "Looking in {} for {}, to replace by {}",
                parent,
                original,
                replacement
            ),
            SubstitutionEvent::NotFound { parent, original } => log::debug!(
                "Cannot find {} in constants of {}: {}",
                original,
                parent,
                TupleDisplay(parent.constants())
            ),
            SubstitutionEvent::Replaced { new_parent, index } => {
                log::debug!("Created {} (replaced constant #{})", new_parent, index)
            }
        }
    }
}

/// Swap `original` for `replacement` in the constants pool of `parent`
///
/// Returns `None` only if there is no parent. If `original` is not among the parent's constants,
/// the parent itself is returned (the same `Arc`) after reporting the miss to `diagnostics`.
/// Otherwise the result is a new code unit which differs from `parent` only in the one constant
/// slot. None of the inputs are modified.
pub fn replace_nested<D: Diagnostics + ?Sized>(
    parent: Option<&Arc<CodeUnit>>,
    original: &CodeUnit,
    replacement: Arc<CodeUnit>,
    diagnostics: &mut D,
) -> Option<Arc<CodeUnit>> {
    let parent = parent?;
    diagnostics.report(SubstitutionEvent::Searching {
        parent,
        original,
        replacement: &replacement,
    });

    let index = match parent.find_nested(original) {
        NestedLookup::Found(index) => index,
        NestedLookup::NotFound => {
            diagnostics.report(SubstitutionEvent::NotFound { parent, original });
            return Some(parent.clone());
        }
    };

    let new_parent = match parent.with_constant(index, Constant::Code(replacement)) {
        Some(new_parent) => Arc::new(new_parent),
        None => return Some(parent.clone()),
    };
    diagnostics.report(SubstitutionEvent::Replaced {
        new_parent: &new_parent,
        index,
    });
    Some(new_parent)
}

#[cfg(test)]
mod test {
    use super::*;

    /// Records the kind of each event reported
    #[derive(Default)]
    struct Recorder(Vec<&'static str>);

    impl Diagnostics for Recorder {
        fn report(&mut self, event: SubstitutionEvent<'_>) {
            self.0.push(match event {
                SubstitutionEvent::Searching { .. } => "searching",
                SubstitutionEvent::NotFound { .. } => "not found",
                SubstitutionEvent::Replaced { .. } => "replaced",
            });
        }
    }

    fn function(name: &str, body: Vec<u8>) -> Arc<CodeUnit> {
        Arc::new(
            CodeUnit::builder(name, "m.py")
                .instructions(body)
                .constants(vec![Constant::None])
                .build(),
        )
    }

    fn module(constants: Vec<Constant>) -> Arc<CodeUnit> {
        Arc::new(
            CodeUnit::builder("<module>", "m.py")
                .stack_size(2)
                .instructions(vec![100, 0, 0, 83])
                .constants(constants)
                .names(vec!["f"])
                .line_table(vec![0, 1])
                .build(),
        )
    }

    #[test]
    fn replaces_the_matching_slot() {
        let original = function("f", vec![100, 0, 0, 83]);
        let replacement = function("f", vec![9, 100, 0, 0, 83]);
        let parent = module(vec![
            Constant::Int(1),
            Constant::bytes("x"),
            Constant::Code(original.clone()),
            Constant::Float(3.5),
        ]);

        let mut recorder = Recorder::default();
        let new_parent =
            replace_nested(Some(&parent), &original, replacement.clone(), &mut recorder).unwrap();

        assert_eq!(
            new_parent.constants(),
            &[
                Constant::Int(1),
                Constant::bytes("x"),
                Constant::Code(replacement),
                Constant::Float(3.5),
            ]
        );
        assert_eq!(new_parent.instructions(), parent.instructions());
        assert_eq!(new_parent.names(), parent.names());
        assert_eq!(new_parent.stack_size(), parent.stack_size());
        assert_eq!(new_parent.line_table(), parent.line_table());
        assert_eq!(recorder.0, vec!["searching", "replaced"]);

        // The old parent still holds the old nested unit
        assert_eq!(parent.find_nested(&original), NestedLookup::Found(2));
    }

    #[test]
    fn missing_original_returns_parent_unchanged() {
        let parent = module(vec![Constant::Code(function("g", vec![83]))]);
        let stranger = function("f", vec![100, 0, 0, 83]);

        let mut recorder = Recorder::default();
        let result =
            replace_nested(Some(&parent), &stranger, function("h", vec![]), &mut recorder).unwrap();

        assert!(Arc::ptr_eq(&result, &parent));
        assert_eq!(recorder.0, vec!["searching", "not found"]);
    }

    #[test]
    fn no_parent_is_a_no_op() {
        let original = function("f", vec![83]);
        let mut recorder = Recorder::default();
        assert!(replace_nested(None, &original, original.clone(), &mut recorder).is_none());
        assert!(recorder.0.is_empty());
    }

    #[test]
    fn reapplying_replaces_the_previous_replacement() {
        let original = function("f", vec![83]);
        let first = function("f", vec![9, 83]);
        let second = function("f", vec![9, 9, 83]);
        let parent = module(vec![Constant::None, Constant::Code(original.clone())]);

        let once = replace_nested(Some(&parent), &original, first.clone(), &mut LogDiagnostics)
            .unwrap();
        let twice =
            replace_nested(Some(&once), &first, second.clone(), &mut LogDiagnostics).unwrap();

        assert_eq!(twice.constants()[1], Constant::Code(second));
        assert_eq!(twice.find_nested(&original), NestedLookup::NotFound);
    }

    #[test]
    fn value_equal_copy_is_found() {
        let original = function("f", vec![83]);
        let parent = module(vec![Constant::Code(original.clone())]);
        let copy = (*original).clone();

        assert_eq!(parent.find_nested(&copy), NestedLookup::Found(0));
    }

    #[test]
    fn first_of_identical_units_wins() {
        let original = function("f", vec![83]);
        let replacement = function("f", vec![9, 83]);
        let parent = module(vec![
            Constant::Code(original.clone()),
            Constant::Code(function("f", vec![83])),
        ]);

        let result =
            replace_nested(Some(&parent), &original, replacement.clone(), &mut LogDiagnostics)
                .unwrap();

        assert_eq!(result.constants()[0], Constant::Code(replacement));
        assert_eq!(result.constants()[1], Constant::Code(original));
    }

    #[test]
    fn unit_holding_nan_is_found() {
        let original = Arc::new(
            CodeUnit::builder("f", "m.py")
                .instructions(vec![100, 0, 0, 83])
                .constants(vec![Constant::Float(f64::NAN)])
                .build(),
        );
        let replacement = function("f", vec![9, 83]);
        let parent = module(vec![Constant::Code(original.clone())]);

        assert_eq!(parent.find_nested(&original), NestedLookup::Found(0));

        let mut recorder = Recorder::default();
        let result =
            replace_nested(Some(&parent), &original, replacement.clone(), &mut recorder).unwrap();
        assert_eq!(result.constants()[0], Constant::Code(replacement));
        assert_eq!(recorder.0, vec!["searching", "replaced"]);
    }

    #[test]
    fn literals_are_never_matched() {
        let original = function("f", vec![83]);
        let parent = module(vec![Constant::tuple(vec![Constant::Code(original.clone())])]);
        assert_eq!(parent.find_nested(&original), NestedLookup::NotFound);
    }
}
