use serde::Serialize;

use crate::models::{CoreError, CoreErrorKind, GameMode, PackageManagerFamily};

/// Build tool invoked from the build directory; the source tree is its sibling.
pub const CONFIGURE_PROGRAM: &str = "cmake";
pub const SOURCE_FROM_BUILD_DIR: &str = "../source/";

/// One value per package-manager family. Adding a family without filling in
/// every table is a compile error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PerFamily<T> {
    pub apt: T,
    pub dnf: T,
    pub yum: T,
    pub pacman: T,
    pub zypper: T,
}

impl<T> PerFamily<T> {
    pub fn get(&self, family: PackageManagerFamily) -> &T {
        match family {
            PackageManagerFamily::Apt => &self.apt,
            PackageManagerFamily::Dnf => &self.dnf,
            PackageManagerFamily::Yum => &self.yum,
            PackageManagerFamily::Pacman => &self.pacman,
            PackageManagerFamily::Zypper => &self.zypper,
        }
    }
}

pub type PackageList = &'static [&'static str];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOptionKind {
    /// `-DNAME=ON|OFF`
    Boolean,
    /// A bare flag such as `-GNinja`, present when switched on.
    Generator,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct BuildOption {
    pub name: &'static str,
    pub description: &'static str,
    pub default: &'static str,
    pub kind: BuildOptionKind,
}

impl BuildOption {
    const fn boolean(
        name: &'static str,
        description: &'static str,
        default: &'static str,
    ) -> Self {
        Self {
            name,
            description,
            default,
            kind: BuildOptionKind::Boolean,
        }
    }

    const fn generator(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            default: "OFF",
            kind: BuildOptionKind::Generator,
        }
    }
}

pub const NINJA_GENERATOR: &str = "-GNinja";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ModeProfile {
    pub mode: GameMode,
    pub source_url: &'static str,
    pub dependencies: PerFamily<PackageList>,
    /// Flags appended to `cmake ../source/` when nothing is overridden.
    pub default_flags: &'static [&'static str],
    pub options: &'static [BuildOption],
}

impl ModeProfile {
    pub fn option(&self, name: &str) -> Option<&BuildOption> {
        self.options
            .iter()
            .find(|option| option.name.eq_ignore_ascii_case(name))
    }
}

/// Immutable lookup data for every supported mode and package-manager family.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigTables {
    base_dependencies: PerFamily<PackageList>,
    ninja_packages: PerFamily<&'static str>,
    profiles: Vec<ModeProfile>,
}

const SERVER_ONLY_FLAGS: &[&str] = &["-DCLIENT=OFF", "-DSERVER=ON"];

const TEEWORLDS_OPTIONS: &[BuildOption] = &[
    BuildOption::boolean("-DCLIENT", "Build client", "OFF"),
    BuildOption::boolean("-DSERVER", "Build server", "ON"),
    BuildOption::boolean("-DMASTERSERVER", "Build masterserver", "OFF"),
    BuildOption::boolean("-DTOOLS", "Build tools", "OFF"),
    BuildOption::boolean("-DDEV", "Development mode", "OFF"),
    BuildOption::generator(NINJA_GENERATOR, "Use Ninja build system (faster)"),
];

const DDNET_OPTIONS: &[BuildOption] = &[
    BuildOption::boolean("-DCLIENT", "Build client", "OFF"),
    BuildOption::boolean("-DSERVER", "Build server", "ON"),
    BuildOption::boolean("-DTOOLS", "Build tools", "OFF"),
    BuildOption::boolean("-DMYSQL", "Enable MySQL support", "OFF"),
    BuildOption::boolean("-DWEBSOCKETS", "Enable WebSocket support", "OFF"),
    BuildOption::boolean("-DVIDEORECORDER", "Enable video recorder", "OFF"),
    BuildOption::boolean("-DUPNP", "Enable UPnP support", "OFF"),
    BuildOption::boolean("-DSTEAM", "Enable Steam integration", "OFF"),
    BuildOption::boolean("-DPREFER_BUNDLED_LIBS", "Use bundled libraries", "OFF"),
    BuildOption::generator(NINJA_GENERATOR, "Use Ninja build system (faster)"),
];

const ZCATCH_OPTIONS: &[BuildOption] = &[
    BuildOption::boolean("-DCLIENT", "Build client", "OFF"),
    BuildOption::boolean("-DSERVER", "Build server", "ON"),
    BuildOption::boolean("-DTOOLS", "Build tools", "OFF"),
    BuildOption::boolean("-DDEV", "Development mode", "OFF"),
    BuildOption::generator(NINJA_GENERATOR, "Use Ninja build system (faster)"),
];

impl ConfigTables {
    pub fn new(
        base_dependencies: PerFamily<PackageList>,
        ninja_packages: PerFamily<&'static str>,
        profiles: Vec<ModeProfile>,
    ) -> Self {
        Self {
            base_dependencies,
            ninja_packages,
            profiles,
        }
    }

    pub fn builtin() -> Self {
        let base_dependencies: PerFamily<PackageList> = PerFamily {
            apt: &[
                "build-essential",
                "cmake",
                "git",
                "python3",
                "libfreetype6-dev",
                "libsdl2-dev",
            ],
            dnf: &[
                "gcc",
                "gcc-c++",
                "make",
                "cmake",
                "git",
                "python3",
                "freetype-devel",
                "SDL2-devel",
            ],
            yum: &[
                "gcc",
                "gcc-c++",
                "make",
                "cmake",
                "git",
                "python3",
                "freetype-devel",
                "SDL2-devel",
            ],
            pacman: &["base-devel", "cmake", "git", "python", "freetype2", "sdl2"],
            zypper: &[
                "gcc",
                "gcc-c++",
                "make",
                "cmake",
                "git",
                "python3",
                "freetype2-devel",
                "libSDL2-devel",
            ],
        };

        let ninja_packages = PerFamily {
            apt: "ninja-build",
            dnf: "ninja-build",
            yum: "ninja-build",
            pacman: "ninja",
            zypper: "ninja",
        };

        let profiles = vec![
            ModeProfile {
                mode: GameMode::Teeworlds,
                source_url: "https://github.com/teeworlds/teeworlds.git",
                dependencies: PerFamily {
                    apt: &["libpnglite-dev", "libwavpack-dev"],
                    dnf: &["libpng-devel", "wavpack-devel"],
                    yum: &["libpng-devel", "wavpack-devel"],
                    pacman: &["libpng", "wavpack"],
                    zypper: &["libpng16-devel", "wavpack-devel"],
                },
                default_flags: SERVER_ONLY_FLAGS,
                options: TEEWORLDS_OPTIONS,
            },
            ModeProfile {
                mode: GameMode::DDNet,
                source_url: "https://github.com/ddnet/ddnet.git",
                dependencies: PerFamily {
                    apt: &["libvulkan-dev", "libsqlite3-dev", "libcurl4-openssl-dev"],
                    dnf: &["vulkan-devel", "sqlite-devel", "libcurl-devel"],
                    yum: &["vulkan-devel", "sqlite-devel", "libcurl-devel"],
                    pacman: &["vulkan-icd-loader", "sqlite", "curl"],
                    zypper: &["vulkan-devel", "sqlite3-devel", "libcurl-devel"],
                },
                default_flags: SERVER_ONLY_FLAGS,
                options: DDNET_OPTIONS,
            },
            ModeProfile {
                mode: GameMode::ZCatch,
                source_url: "https://github.com/jxsl13/zcatch.git",
                dependencies: PerFamily {
                    apt: &["libcurl4-openssl-dev"],
                    dnf: &["libcurl-devel"],
                    yum: &["libcurl-devel"],
                    pacman: &["curl"],
                    zypper: &["libcurl-devel"],
                },
                default_flags: SERVER_ONLY_FLAGS,
                options: ZCATCH_OPTIONS,
            },
        ];

        Self::new(base_dependencies, ninja_packages, profiles)
    }

    pub fn profile(&self, mode: GameMode) -> Option<&ModeProfile> {
        self.profiles.iter().find(|profile| profile.mode == mode)
    }

    pub fn profiles(&self) -> &[ModeProfile] {
        &self.profiles
    }

    pub fn base_dependencies(&self, family: PackageManagerFamily) -> PackageList {
        *self.base_dependencies.get(family)
    }

    pub fn ninja_package(&self, family: PackageManagerFamily) -> &'static str {
        *self.ninja_packages.get(family)
    }

    /// Checks that every listed mode has exactly one profile with a package
    /// list for every family and a usable build invocation.
    pub fn validate(&self) -> Result<(), CoreError> {
        for mode in GameMode::ALL {
            let matching = self
                .profiles
                .iter()
                .filter(|profile| profile.mode == mode)
                .count();
            if matching != 1 {
                return Err(configuration_error(format!(
                    "mode '{mode}' must have exactly one profile, found {matching}"
                )));
            }
        }

        for family in PackageManagerFamily::ALL {
            if self.base_dependencies(family).is_empty() {
                return Err(configuration_error(format!(
                    "no base dependencies configured for '{family}'"
                )));
            }
            if self.ninja_package(family).trim().is_empty() {
                return Err(configuration_error(format!(
                    "no ninja package configured for '{family}'"
                )));
            }
        }

        for profile in &self.profiles {
            let mode = profile.mode;
            if profile.source_url.trim().is_empty() {
                return Err(configuration_error(format!("mode '{mode}' has no source URL")));
            }
            if profile.default_flags.is_empty() {
                return Err(configuration_error(format!(
                    "mode '{mode}' has no build options"
                )));
            }
            for family in PackageManagerFamily::ALL {
                let packages = profile.dependencies.get(family);
                if packages.is_empty() || packages.iter().any(|package| package.trim().is_empty())
                {
                    return Err(configuration_error(format!(
                        "mode '{mode}' has no dependencies for '{family}'"
                    )));
                }
            }
            for flag in profile.default_flags {
                let name = flag.split('=').next().unwrap_or(flag);
                if profile.option(name).is_none() {
                    return Err(configuration_error(format!(
                        "mode '{mode}' default flag '{flag}' is not in its option catalogue"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn configuration_error(message: String) -> CoreError {
    CoreError::new(CoreErrorKind::Configuration, message)
}
