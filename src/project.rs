//! Build metadata emitted by the ESP-IDF build system.
//!
//! Both files live in the build directory and are only ever read.

use std::{
    fmt,
    fs::read_to_string,
    path::{Path, PathBuf},
};

use log::{debug, trace};
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer,
};

use crate::Error;

pub const PROJECT_DESCRIPTION: &str = "project_description.json";
pub const FLASHER_ARGS: &str = "flasher_args.json";

/// sdkconfig option selecting how the monitor decodes core dumps.
pub const CORE_DUMP_DECODE: &str = "CONFIG_ESP32_CORE_DUMP_DECODE";

/// Description of the compiled project and its runtime parameters.
#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
pub struct ProjectDescription {
    /// Path of the application ELF, relative to the build directory.
    pub app_elf: PathBuf,
    /// Default baud rate of the monitor, from the project configuration.
    #[serde(deserialize_with = "deserialize_baud")]
    pub monitor_baud: u32,
    /// Prefix of the cross toolchain, used by the monitor to decode addresses.
    pub monitor_toolprefix: String,
    /// Path of the `sdkconfig` file the project was built with.
    pub config_file: PathBuf,
}

impl ProjectDescription {
    /// Load `project_description.json` from the build directory.
    pub fn load(build_dir: &Path) -> Result<Self, Error> {
        let path = build_dir.join(PROJECT_DESCRIPTION);
        load_json(
            &path,
            "Build the project before running `monitor` (e.g. `idf.py build`).",
        )
    }

    /// Absolute location of the application ELF.
    pub fn elf_path(&self, build_dir: &Path) -> PathBuf {
        build_dir.join(&self.app_elf)
    }
}

/// The arguments the build system recorded for `esptool.py`.
#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
pub struct FlasherArgs {
    pub extra_esptool_args: ExtraEsptoolArgs,
}

#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
pub struct ExtraEsptoolArgs {
    /// Reset behavior before the operation, e.g. `default_reset`.
    pub before: String,
    /// Reset behavior after the operation, e.g. `hard_reset`.
    pub after: String,
    /// Chip identifier, e.g. `esp32`.
    pub chip: String,
    /// Whether the flasher stub is uploaded to the chip.
    pub stub: bool,
}

impl FlasherArgs {
    /// Load `flasher_args.json` from the build directory.
    pub fn load(build_dir: &Path) -> Result<Self, Error> {
        let path = build_dir.join(FLASHER_ARGS);
        load_json(&path, "Build the project first (e.g. `idf.py build`).")
    }
}

/// Look up `key` in an `sdkconfig` file. The last assignment wins and
/// surrounding quotes are stripped. Returns `None` when the option is not set.
pub fn sdkconfig_value(sdkconfig: &Path, key: &str) -> Result<Option<String>, Error> {
    let content = read_to_string(sdkconfig).map_err(|_| Error::MissingArtifact {
        path: sdkconfig.to_path_buf(),
        hint: "Reconfigure the project to regenerate its sdkconfig.".into(),
    })?;

    Ok(parse_sdkconfig_value(&content, key))
}

// =============================================================================
// Private stuff
// =============================================================================

fn load_json<T>(path: &Path, hint: &str) -> Result<T, Error>
where
    T: for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Err(Error::MissingArtifact {
            path: path.to_path_buf(),
            hint: hint.into(),
        });
    }
    debug!("Loading {}", path.display());

    let content = read_to_string(path)?;
    trace!("{}", content);
    serde_json::from_str(&content).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_sdkconfig_value(content: &str, key: &str) -> Option<String> {
    let mut value = None;
    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        let rest = match line.strip_prefix(key).and_then(|r| r.strip_prefix('=')) {
            Some(rest) => rest,
            None => continue,
        };
        let rest = rest.strip_prefix('"').unwrap_or(rest);
        let rest = rest.strip_suffix('"').unwrap_or(rest);
        // Quoted values never contain a quote themselves.
        if !rest.contains('"') {
            value = Some(rest.to_string());
        }
    }
    value
}

/// CMake writes the baud rate as a string, older versions as a number.
fn deserialize_baud<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    struct BaudVisitor;

    impl<'de> Visitor<'de> for BaudVisitor {
        type Value = u32;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a baud rate as a number or a numeric string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u32, E> {
            if v == 0 || v > u64::from(u32::MAX) {
                return Err(E::custom(format!("baud rate {} out of range", v)));
            }
            Ok(v as u32)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u32, E> {
            if v <= 0 {
                return Err(E::custom(format!("baud rate {} out of range", v)));
            }
            self.visit_u64(v as u64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u32, E> {
            match v.trim().parse::<u32>() {
                Ok(baud) if baud > 0 => Ok(baud),
                _ => Err(E::custom(format!("invalid baud rate `{}`", v))),
            }
        }
    }

    deserializer.deserialize_any(BaudVisitor)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("idfcom-project-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn description_with_string_baud() {
    let desc: ProjectDescription = serde_json::from_str(
        r#"{
            "project_name": "blink",
            "app_elf": "blink.elf",
            "monitor_baud": "115200",
            "monitor_toolprefix": "xtensa-esp32-elf-",
            "config_file": "/work/blink/sdkconfig"
        }"#,
    )
    .unwrap();
    assert_eq!(desc.monitor_baud, 115_200);
    assert_eq!(desc.app_elf, PathBuf::from("blink.elf"));
    assert_eq!(
        desc.elf_path(Path::new("/work/blink/build")),
        PathBuf::from("/work/blink/build/blink.elf")
    );
}

#[test]
fn description_with_numeric_baud() {
    let desc: ProjectDescription = serde_json::from_str(
        r#"{"app_elf": "a.elf", "monitor_baud": 74880,
            "monitor_toolprefix": "riscv32-esp-elf-", "config_file": "sdkconfig"}"#,
    )
    .unwrap();
    assert_eq!(desc.monitor_baud, 74_880);
}

#[test]
fn description_rejects_bad_baud() {
    let result: Result<ProjectDescription, _> = serde_json::from_str(
        r#"{"app_elf": "a.elf", "monitor_baud": "fast",
            "monitor_toolprefix": "x-", "config_file": "sdkconfig"}"#,
    );
    assert!(result.is_err());
}

#[test]
fn description_requires_monitor_baud() {
    let result: Result<ProjectDescription, _> = serde_json::from_str(
        r#"{"app_elf": "a.elf", "monitor_toolprefix": "x-", "config_file": "sdkconfig"}"#,
    );
    let message = result.unwrap_err().to_string();
    assert!(message.contains("monitor_baud"), "{}", message);
}

#[test]
fn missing_description_is_missing_artifact() {
    let dir = scratch_dir("missing");
    match ProjectDescription::load(&dir) {
        Err(Error::MissingArtifact { path, .. }) => {
            assert_eq!(path, dir.join(PROJECT_DESCRIPTION))
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn load_flasher_args() {
    let dir = scratch_dir("flasher");
    std::fs::write(
        dir.join(FLASHER_ARGS),
        r#"{
            "write_flash_args": ["--flash_mode", "dio"],
            "extra_esptool_args": {
                "after": "hard_reset",
                "before": "default_reset",
                "stub": false,
                "chip": "esp32s3"
            }
        }"#,
    )
    .unwrap();

    let args = FlasherArgs::load(&dir).unwrap();
    assert_eq!(
        args.extra_esptool_args,
        ExtraEsptoolArgs {
            before: "default_reset".into(),
            after: "hard_reset".into(),
            chip: "esp32s3".into(),
            stub: false,
        }
    );
}

#[test]
fn malformed_json_names_the_file() {
    let dir = scratch_dir("malformed");
    std::fs::write(dir.join(FLASHER_ARGS), "{ not json").unwrap();
    match FlasherArgs::load(&dir) {
        Err(Error::Json { path, .. }) => assert_eq!(path, dir.join(FLASHER_ARGS)),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn sdkconfig_lookup() {
    let content = "\
# CONFIG_ESP32_CORE_DUMP_DECODE is not set
CONFIG_ESP32_CORE_DUMP_DECODE_INFO=y
CONFIG_ESP32_CORE_DUMP_DECODE=\"info\"
CONFIG_ESPTOOLPY_MONITOR_BAUD=115200
";
    assert_eq!(
        parse_sdkconfig_value(content, CORE_DUMP_DECODE),
        Some("info".to_string())
    );
    assert_eq!(
        parse_sdkconfig_value(content, "CONFIG_ESPTOOLPY_MONITOR_BAUD"),
        Some("115200".to_string())
    );
    assert_eq!(parse_sdkconfig_value(content, "CONFIG_NOT_THERE"), None);
}

#[test]
fn sdkconfig_last_assignment_wins() {
    let content = "CONFIG_A=\"one\"\nCONFIG_A=\"two\"\n";
    assert_eq!(parse_sdkconfig_value(content, "CONFIG_A"), Some("two".into()));
}

#[test]
fn sdkconfig_file_missing() {
    let dir = scratch_dir("sdkconfig");
    let result = sdkconfig_value(&dir.join("sdkconfig"), CORE_DUMP_DECODE);
    assert!(matches!(result, Err(Error::MissingArtifact { .. })));

    std::fs::write(dir.join("sdkconfig"), "CONFIG_ESP32_CORE_DUMP_DECODE=\"disable\"\n").unwrap();
    assert_eq!(
        sdkconfig_value(&dir.join("sdkconfig"), CORE_DUMP_DECODE).unwrap(),
        Some("disable".into())
    );
}
