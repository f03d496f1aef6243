//! Linearized list of the actions requested for one invocation.

use std::collections::BTreeSet;

use log::debug;

use super::kind::Action;

/// Whether the encrypted flash targets are in use for this invocation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FlashEncryption {
    Disabled,
    Enabled,
}

impl Default for FlashEncryption {
    fn default() -> Self {
        FlashEncryption::Disabled
    }
}

/// The actions to execute, in order, together with the invocation wide
/// encryption mode.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Plan {
    actions: Vec<Action>,
    encryption: FlashEncryption,
}

impl Plan {
    /// Order the requested actions.
    ///
    /// Each action is preceded by those of its predecessors that were also
    /// requested; predecessors that were not requested are not added. Apart
    /// from that, the request order is kept and duplicates are dropped.
    pub fn schedule(requested: &[Action]) -> Self {
        let wanted: BTreeSet<Action> = requested.iter().copied().collect();
        let mut actions = Vec::with_capacity(wanted.len());
        for action in requested {
            place(*action, &wanted, &mut actions);
        }

        let encryption = if actions.iter().any(|a| a.is_encrypted_flash()) {
            FlashEncryption::Enabled
        } else {
            FlashEncryption::Disabled
        };

        debug!("scheduled {:?} ({:?})", actions, encryption);
        Plan {
            actions,
            encryption,
        }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn encryption(&self) -> FlashEncryption {
        self.encryption
    }

    /// Whether a scheduled `monitor` has to run with encrypted flash targets.
    /// Always `false` when no monitor is scheduled.
    pub fn monitor_encrypted(&self) -> bool {
        self.encryption == FlashEncryption::Enabled && self.actions.contains(&Action::Monitor)
    }
}

/// Depth first placement; the static predecessor lists are acyclic.
fn place(action: Action, wanted: &BTreeSet<Action>, actions: &mut Vec<Action>) {
    if actions.contains(&action) {
        return;
    }
    for predecessor in action.predecessors() {
        if wanted.contains(predecessor) {
            place(*predecessor, wanted, actions);
        }
    }
    actions.push(action);
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
use pretty_assertions::assert_eq;

#[test]
fn keeps_request_order_without_constraints() {
    let plan = Plan::schedule(&[Action::App, Action::Bootloader]);
    assert_eq!(plan.actions(), &[Action::App, Action::Bootloader]);
}

#[test]
fn erase_runs_before_flash() {
    let plan = Plan::schedule(&[Action::Flash, Action::EraseFlash]);
    assert_eq!(plan.actions(), &[Action::EraseFlash, Action::Flash]);
}

#[test]
fn flash_monitor_in_any_order() {
    let expected = [Action::Flash, Action::Monitor];
    assert_eq!(
        Plan::schedule(&[Action::Monitor, Action::Flash]).actions(),
        &expected
    );
    assert_eq!(
        Plan::schedule(&[Action::Flash, Action::Monitor]).actions(),
        &expected
    );
}

#[test]
fn full_pipeline() {
    let plan = Plan::schedule(&[
        Action::Monitor,
        Action::AppFlash,
        Action::EraseFlash,
        Action::App,
        Action::Monitor,
    ]);
    assert_eq!(
        plan.actions(),
        &[
            Action::App,
            Action::EraseFlash,
            Action::AppFlash,
            Action::Monitor
        ]
    );
}

#[test]
fn predecessors_are_not_added() {
    let plan = Plan::schedule(&[Action::Monitor]);
    assert_eq!(plan.actions(), &[Action::Monitor]);
    assert_eq!(plan.len(), 1);
}

#[test]
fn encrypted_flash_sets_monitor_encryption() {
    for encrypted in [Action::EncryptedFlash, Action::EncryptedAppFlash].iter() {
        let plan = Plan::schedule(&[*encrypted, Action::Monitor]);
        assert_eq!(plan.encryption(), FlashEncryption::Enabled);
        assert!(plan.monitor_encrypted());
    }
}

#[test]
fn plain_flash_leaves_monitor_unencrypted() {
    let plan = Plan::schedule(&[Action::Flash, Action::Monitor]);
    assert_eq!(plan.encryption(), FlashEncryption::Disabled);
    assert!(!plan.monitor_encrypted());
}

#[test]
fn encryption_without_monitor_is_noop() {
    let plan = Plan::schedule(&[Action::EncryptedFlash]);
    assert_eq!(plan.encryption(), FlashEncryption::Enabled);
    assert!(!plan.monitor_encrypted());
    assert_eq!(plan.actions(), &[Action::EncryptedFlash]);
}

#[test]
fn empty_request() {
    let plan = Plan::schedule(&[]);
    assert!(plan.is_empty());
    assert!(!plan.monitor_encrypted());
}
