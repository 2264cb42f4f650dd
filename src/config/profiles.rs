//! Build profiles.
//!
//! Each profile captures one historical variant of the KiwiOS pipeline: the
//! target triples handed to the compiler and linker driver, and whether the
//! compiler's runtime-support library takes part in the link.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Profile used when neither the settings file nor the command line picks one.
pub const DEFAULT_PROFILE: &str = "pc-none-elf";

lazy_static! {
    static ref PROFILES: HashMap<String, ProfileDefinition> = {
        let mut profiles = HashMap::new();

        profiles.insert(
            "pc-none-elf".to_string(),
            ProfileDefinition::new(
                "pc-none-elf",
                "Compile for i686-elf, link for i686-pc-none-elf, no runtime library",
                "i686-elf",
                "i686-pc-none-elf",
                RuntimeSupport::Disabled,
            ),
        );

        profiles.insert(
            "elf".to_string(),
            ProfileDefinition::new(
                "elf",
                "Compile and link for i686-elf against the compiler runtime builtins",
                "i686-elf",
                "i686-elf",
                RuntimeSupport::Required,
            ),
        );

        profiles
    };
}

/// Whether the compiler runtime-support library is linked into the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeSupport {
    /// Link it; failing to locate it aborts the build.
    Required,
    /// Link it when the compiler reports a runtime directory.
    Optional,
    /// Never link it.
    Disabled,
}

impl fmt::Display for RuntimeSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeSupport::Required => write!(f, "required"),
            RuntimeSupport::Optional => write!(f, "optional"),
            RuntimeSupport::Disabled => write!(f, "disabled"),
        }
    }
}

impl FromStr for RuntimeSupport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "required" => Ok(RuntimeSupport::Required),
            "optional" => Ok(RuntimeSupport::Optional),
            "disabled" => Ok(RuntimeSupport::Disabled),
            _ => Err(format!("Unknown runtime support policy: {}", s)),
        }
    }
}

/// Profile definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDefinition {
    pub name: String,
    pub description: String,
    pub compile_target: String,
    pub link_target: String,
    pub march: String,
    pub runtime_support: RuntimeSupport,
    /// File name of the static builtins archive inside the runtime directory.
    pub runtime_library: String,
}

impl ProfileDefinition {
    fn new(
        name: &str,
        description: &str,
        compile_target: &str,
        link_target: &str,
        runtime_support: RuntimeSupport,
    ) -> Self {
        ProfileDefinition {
            name: name.to_string(),
            description: description.to_string(),
            compile_target: compile_target.to_string(),
            link_target: link_target.to_string(),
            march: "i686".to_string(),
            runtime_support,
            runtime_library: "libclang_rt.builtins-i386.a".to_string(),
        }
    }
}

/// Get available profiles, sorted by name.
pub fn get_available_profiles() -> Vec<ProfileDefinition> {
    let mut profiles: Vec<ProfileDefinition> = PROFILES.values().cloned().collect();
    profiles.sort_by(|a, b| a.name.cmp(&b.name));
    profiles
}

/// Get profile by name.
pub fn get_profile(name: &str) -> Option<ProfileDefinition> {
    PROFILES.get(&name.to_lowercase()).cloned()
}
