//! Declarative table of named actions and their predecessors.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use super::kind::{Action, ActionOption};
use crate::Error;

/// Declaration of one named action.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ActionSpec {
    pub name: String,
    /// Names of the actions that must complete first, in declaration order.
    pub predecessors: Vec<String>,
    pub options: BTreeSet<ActionOption>,
}

impl ActionSpec {
    pub fn new<'a, I>(name: &str, predecessors: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        ActionSpec {
            name: name.to_string(),
            predecessors: predecessors.into_iter().map(String::from).collect(),
            options: BTreeSet::new(),
        }
    }

    pub fn with_options(mut self, options: &[ActionOption]) -> Self {
        self.options.extend(options.iter().copied());
        self
    }
}

impl From<Action> for ActionSpec {
    fn from(action: Action) -> Self {
        ActionSpec {
            name: action.to_string(),
            predecessors: action.predecessors().iter().map(Action::to_string).collect(),
            options: action.options().iter().copied().collect(),
        }
    }
}

/// A set of [`ActionSpec`]s, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    specs: BTreeMap<String, ActionSpec>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table declaring every [`Action`].
    pub fn standard() -> Self {
        let mut table = Self::new();
        for action in Action::ALL.iter() {
            // Names are unique by construction
            table
                .specs
                .insert(action.to_string(), ActionSpec::from(*action));
        }
        table
    }

    pub fn register(&mut self, spec: ActionSpec) -> Result<(), Error> {
        if self.specs.contains_key(&spec.name) {
            return Err(Error::DuplicateAction(spec.name));
        }
        trace!("registering {:?}", spec);
        self.specs.insert(spec.name.clone(), spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.specs.get(name)
    }

    pub fn predecessors_of(&self, name: &str) -> Option<&[String]> {
        self.specs.get(name).map(|spec| spec.predecessors.as_slice())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Check that every predecessor is declared and that following
    /// predecessors never leads back to an action already on the path.
    pub fn validate(&self) -> Result<(), Error> {
        for spec in self.specs.values() {
            for predecessor in &spec.predecessors {
                if !self.specs.contains_key(predecessor) {
                    return Err(Error::DanglingReference {
                        action: spec.name.clone(),
                        predecessor: predecessor.clone(),
                    });
                }
            }
        }

        let mut marks = BTreeMap::<&str, Mark>::new();
        let mut path = Vec::<&str>::new();
        for name in self.specs.keys() {
            self.visit(name, &mut marks, &mut path)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        marks: &mut BTreeMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Result<(), Error> {
        match marks.get(name) {
            Some(Mark::Visited) => return Ok(()),
            Some(Mark::Visiting) => {
                // `name` is already on the current path
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Err(Error::Cycle(cycle));
            }
            None => {}
        }

        marks.insert(name, Mark::Visiting);
        path.push(name);
        if let Some(spec) = self.specs.get(name) {
            for predecessor in &spec.predecessors {
                self.visit(predecessor, marks, path)?;
            }
        }
        path.pop();
        marks.insert(name, Mark::Visited);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Mark {
    Visiting,
    Visited,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn standard_table_is_valid() {
    let table = ActionTable::standard();
    assert_eq!(table.len(), Action::ALL.len());
    table.validate().unwrap();
}

#[test]
fn standard_predecessors() {
    let table = ActionTable::standard();
    assert_eq!(
        table.predecessors_of("partition_table-flash").unwrap(),
        &["partition_table".to_string(), "erase_flash".to_string()]
    );
    assert_eq!(
        table.predecessors_of("monitor").unwrap().first().map(String::as_str),
        Some("flash")
    );
    assert!(table.predecessors_of("erase_flash").unwrap().is_empty());
    assert_eq!(table.predecessors_of("build"), None);
}

#[test]
fn standard_options() {
    let table = ActionTable::standard();
    let monitor = table.get("monitor").unwrap();
    assert!(monitor.options.contains(&ActionOption::PrintFilter));
    assert!(table.get("encrypted-flash").unwrap().options.is_empty());
}

#[test]
fn duplicate_registration_rejected() {
    let mut table = ActionTable::new();
    table.register(ActionSpec::new("a", vec![])).unwrap();
    assert!(matches!(
        table.register(ActionSpec::new("a", vec!["b"])),
        Err(Error::DuplicateAction(ref name)) if name == "a"
    ));
}

#[test]
fn self_reference_rejected() {
    let mut table = ActionTable::new();
    table.register(ActionSpec::new("a", vec!["a"])).unwrap();
    match table.validate() {
        Err(Error::Cycle(cycle)) => assert_eq!(cycle, vec!["a", "a"]),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn indirect_cycle_rejected() {
    let mut table = ActionTable::new();
    table.register(ActionSpec::new("a", vec!["b"])).unwrap();
    table.register(ActionSpec::new("b", vec!["a"])).unwrap();
    match table.validate() {
        Err(Error::Cycle(cycle)) => assert_eq!(cycle, vec!["a", "b", "a"]),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn cycle_below_acyclic_root_rejected() {
    let mut table = ActionTable::new();
    table.register(ActionSpec::new("root", vec!["x"])).unwrap();
    table.register(ActionSpec::new("x", vec!["y"])).unwrap();
    table.register(ActionSpec::new("y", vec!["z"])).unwrap();
    table.register(ActionSpec::new("z", vec!["x"])).unwrap();
    match table.validate() {
        Err(Error::Cycle(cycle)) => assert_eq!(cycle, vec!["x", "y", "z", "x"]),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn dangling_reference_rejected() {
    let mut table = ActionTable::new();
    table.register(ActionSpec::new("flash", vec!["all"])).unwrap();
    match table.validate() {
        Err(Error::DanglingReference {
            action,
            predecessor,
        }) => {
            assert_eq!(action, "flash");
            assert_eq!(predecessor, "all");
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn diamond_of_depth_three_accepted() {
    // Shared predecessors are not cycles.
    let mut table = ActionTable::new();
    table.register(ActionSpec::new("d", vec!["b", "c"])).unwrap();
    table.register(ActionSpec::new("c", vec!["a"])).unwrap();
    table.register(ActionSpec::new("b", vec!["a"])).unwrap();
    table.register(ActionSpec::new("a", vec![])).unwrap();
    table
        .register(ActionSpec::new("e", vec!["d"]).with_options(&[ActionOption::Port]))
        .unwrap();
    table.validate().unwrap();
}
