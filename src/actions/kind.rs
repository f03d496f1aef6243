//! The known actions.

use strum::{Display, EnumString, IntoStaticStr, VariantNames};

/// An action the user can request on the command line.
///
/// The build pipeline targets (`all`, `app`, `bootloader` and
/// `partition_table`) are built by the build system itself; they are listed
/// here so that flashing can be ordered after them.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    VariantNames,
)]
pub enum Action {
    #[strum(to_string = "all")]
    All,
    #[strum(to_string = "app")]
    App,
    #[strum(to_string = "bootloader")]
    Bootloader,
    #[strum(to_string = "partition_table")]
    PartitionTable,
    #[strum(to_string = "erase_flash")]
    EraseFlash,
    #[strum(to_string = "flash")]
    Flash,
    #[strum(to_string = "app-flash")]
    AppFlash,
    #[strum(to_string = "bootloader-flash")]
    BootloaderFlash,
    #[strum(to_string = "partition_table-flash")]
    PartitionTableFlash,
    #[strum(to_string = "encrypted-flash")]
    EncryptedFlash,
    #[strum(to_string = "encrypted-app-flash")]
    EncryptedAppFlash,
    #[strum(to_string = "monitor")]
    Monitor,
}

/// How an action gets executed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ActionKind {
    /// A target of the build system, run without any serial settings.
    Build,
    /// A build system flash target, run with the resolved port and baud rate.
    Flash,
    /// `esptool.py erase_flash`.
    EraseFlash,
    /// `idf_monitor.py`.
    Monitor,
}

/// An option an action accepts on the command line.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ActionOption {
    Port,
    Baud,
    MonitorBaud,
    PrintFilter,
    Encrypted,
}

const PORT_AND_BAUD: &[ActionOption] = &[ActionOption::Port, ActionOption::Baud];

impl Action {
    /// Every action, in declaration order.
    pub const ALL: [Action; 12] = [
        Action::All,
        Action::App,
        Action::Bootloader,
        Action::PartitionTable,
        Action::EraseFlash,
        Action::Flash,
        Action::AppFlash,
        Action::BootloaderFlash,
        Action::PartitionTableFlash,
        Action::EncryptedFlash,
        Action::EncryptedAppFlash,
        Action::Monitor,
    ];

    /// The actions that must complete before this one when they are
    /// scheduled in the same invocation.
    pub fn predecessors(self) -> &'static [Action] {
        use Action::*;

        match self {
            All | App | Bootloader | PartitionTable | EraseFlash => &[],
            Flash | EncryptedFlash => &[All, EraseFlash],
            AppFlash | EncryptedAppFlash => &[App, EraseFlash],
            BootloaderFlash => &[Bootloader, EraseFlash],
            PartitionTableFlash => &[PartitionTable, EraseFlash],
            Monitor => &[
                Flash,
                EncryptedFlash,
                PartitionTableFlash,
                BootloaderFlash,
                AppFlash,
                EncryptedAppFlash,
            ],
        }
    }

    /// The options this action declares. The encrypted flash variants have
    /// none of their own and use the invocation wide port and baud rate.
    pub fn options(self) -> &'static [ActionOption] {
        use Action::*;

        match self {
            All | App | Bootloader | PartitionTable => &[],
            EncryptedFlash | EncryptedAppFlash => &[],
            EraseFlash | Flash | AppFlash | BootloaderFlash | PartitionTableFlash => PORT_AND_BAUD,
            Monitor => &[
                ActionOption::Port,
                ActionOption::MonitorBaud,
                ActionOption::PrintFilter,
                ActionOption::Encrypted,
            ],
        }
    }

    pub fn kind(self) -> ActionKind {
        use Action::*;

        match self {
            All | App | Bootloader | PartitionTable => ActionKind::Build,
            Flash | AppFlash | BootloaderFlash | PartitionTableFlash | EncryptedFlash
            | EncryptedAppFlash => ActionKind::Flash,
            EraseFlash => ActionKind::EraseFlash,
            Monitor => ActionKind::Monitor,
        }
    }

    /// Whether this is one of the encrypted flash variants.
    pub fn is_encrypted_flash(self) -> bool {
        matches!(self, Action::EncryptedFlash | Action::EncryptedAppFlash)
    }

    /// One line description shown in the command line help.
    pub fn help(self) -> &'static str {
        use Action::*;

        match self {
            All => "Build the project.",
            App => "Build only the app.",
            Bootloader => "Build only the bootloader.",
            PartitionTable => "Build only the partition table.",
            EraseFlash => "Erase entire flash chip.",
            Flash => "Flash the project.",
            AppFlash => "Flash the app only.",
            BootloaderFlash => "Flash bootloader only.",
            PartitionTableFlash => "Flash partition table only.",
            EncryptedFlash => "Flash the encrypted project.",
            EncryptedAppFlash => "Flash the encrypted app only.",
            Monitor => "Display serial output.",
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn names_round_trip() {
    use std::str::FromStr;

    for action in Action::ALL.iter() {
        let name = action.to_string();
        assert_eq!(Action::from_str(&name).unwrap(), *action);
        let static_name: &'static str = (*action).into();
        assert_eq!(static_name, name);
    }
    assert_eq!(Action::PartitionTableFlash.to_string(), "partition_table-flash");
    assert!(Action::from_str("flash_all").is_err());
}

#[test]
fn variant_names_cover_all() {
    assert_eq!(Action::VARIANTS.len(), Action::ALL.len());
    assert!(Action::VARIANTS.contains(&"encrypted-app-flash"));
    assert!(Action::VARIANTS.contains(&"erase_flash"));
}

#[test]
fn flash_variants_order_after_erase() {
    for action in Action::ALL.iter().filter(|a| a.kind() == ActionKind::Flash) {
        assert!(
            action.predecessors().contains(&Action::EraseFlash),
            "{} should run after erase_flash",
            action
        );
    }
}

#[test]
fn monitor_follows_every_flash_variant() {
    let flashes: Vec<Action> = Action::ALL
        .iter()
        .copied()
        .filter(|a| a.kind() == ActionKind::Flash)
        .collect();
    let mut predecessors = Action::Monitor.predecessors().to_vec();
    predecessors.sort();
    assert_eq!(predecessors, flashes);
}

#[test]
fn monitor_options() {
    assert!(Action::Monitor.options().contains(&ActionOption::Encrypted));
    assert!(!Action::Monitor.options().contains(&ActionOption::Baud));
    assert!(Action::EncryptedFlash.options().is_empty());
    assert_eq!(Action::AppFlash.options(), PORT_AND_BAUD);
}
