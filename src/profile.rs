use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::{Deserialize, Deserializer};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::actions::Action;
use crate::config::{SwipeConfig, SwipeOverrides, resolve};
use crate::gesture::SwipeDirection;
use crate::input;

/// Binding key for the handler that fires on every swipe.
pub const ANY_SWIPE_BINDING: &str = "swipe.any";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
    #[serde(default)]
    pub allow_commands: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tracking {
    #[serde(default = "default_smooth_ema")]
    pub smooth_ema: f64,
}

fn default_smooth_ema() -> f64 {
    0.6
}

impl Default for Tracking {
    fn default() -> Self {
        Self {
            smooth_ema: default_smooth_ema(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,

    #[serde(default, deserialize_with = "deserialize_overrides")]
    pub swipe: SwipeOverrides,

    #[serde(default)]
    pub tracking: Tracking,

    // nested/dotted tables flattened into "a.b" -> "value"
    #[serde(default, deserialize_with = "deserialize_bindings_flat")]
    pub bindings: HashMap<String, String>,
}

impl Profile {
    pub fn swipe_config(&self) -> SwipeConfig {
        resolve(&self.swipe)
    }

    /// `[meta] name`, or `fallback` (the file stem) when unset.
    pub fn display_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.meta.name.as_deref().unwrap_or(fallback)
    }

    pub fn binding(&self, key: &str) -> Option<&str> {
        self.bindings
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

fn deserialize_overrides<'de, D>(de: D) -> std::result::Result<SwipeOverrides, D::Error>
where
    D: Deserializer<'de>,
{
    let val = toml::Value::deserialize(de)?;
    Ok(SwipeOverrides::from_toml(&val))
}

fn deserialize_bindings_flat<'de, D>(
    de: D,
) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = toml::Value::deserialize(de)?;
    let table = match val {
        toml::Value::Table(t) => t,
        other => {
            return Err(serde::de::Error::custom(format!(
                "bindings must be a table, got {:?}",
                other.type_str()
            )));
        }
    };

    let mut out = HashMap::new();
    flatten_table("", &table, &mut out).map_err(serde::de::Error::custom)?;
    Ok(out)
}

fn flatten_table(
    prefix: &str,
    table: &toml::value::Table,
    out: &mut HashMap<String, String>,
) -> std::result::Result<(), String> {
    for (k, v) in table {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        match v {
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            toml::Value::Table(sub) => flatten_table(&key, sub, out)?,
            other => {
                return Err(format!(
                    "binding '{key}' value must be a string, got {}",
                    other.type_str()
                ));
            }
        }
    }
    Ok(())
}

pub fn parse_profile(txt: &str) -> Result<Profile> {
    let profile: Profile = toml::from_str(txt)?;
    validate_profile(&profile)?;
    Ok(profile)
}

fn validate_profile(p: &Profile) -> Result<()> {
    let ema = p.tracking.smooth_ema;
    if !(ema > 0.0 && ema <= 1.0) {
        return Err(anyhow!("tracking.smooth_ema must be in (0,1], got {ema}"));
    }

    for (k, v) in &p.bindings {
        let known = k == ANY_SWIPE_BINDING
            || SwipeDirection::ALL.iter().any(|d| d.binding_key() == k);
        if !known {
            warn!("binding '{k}' does not name a swipe; it will never fire");
        }
        let action: Action = v
            .parse()
            .map_err(|e| anyhow!("binding '{k}' has invalid action '{v}': {e}"))?;
        if matches!(action, Action::Command(_)) && !p.meta.allow_commands {
            return Err(anyhow!("binding '{k}' uses cmd: but allow_commands=false"));
        }
    }
    Ok(())
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

pub fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("swipectl"))
}

fn valid_profile_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
    pub detected_devices: Vec<String>,
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let mut st = Self::load_or_install_in(config_dir()?)?;
        st.detected_devices = input::discover_touch_devices()
            .iter()
            .map(|d| d.describe())
            .collect();
        Ok(st)
    }

    /// Same as [`Self::load_or_install_default`] rooted at `cfgdir`, without
    /// probing devices.
    pub fn load_or_install_in(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            fs::write(&active_ptr, b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            profiles_dir: profdir,
            active_ptr,
            detected_devices: Vec::new(),
        })
    }

    pub fn active_profile_path(&self) -> PathBuf {
        self.profiles_dir.join(format!("{}.toml", self.active_name))
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    /// Re-read the active pointer as well as the profile it names.
    /// Keeps the previous state if either fails.
    pub fn sync_from_disk(&mut self) -> Result<()> {
        let name = fs::read_to_string(&self.active_ptr)?.trim().to_string();
        let profile = load_profile(&self.profiles_dir, &name)?;
        self.active_name = name;
        self.profile = profile;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        if !valid_profile_name(name) {
            return Err(anyhow!("invalid profile name: '{name}'"));
        }
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profile_name": self.profile.display_name(&self.active_name),
            "effective_swipe": self.profile.swipe_config(),
            "devices": self.detected_devices,
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn load_profile(profiles_dir: &Path, name: &str) -> Result<Profile> {
    let path = profiles_dir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    parse_profile(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
}

fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    s.lines()
        .filter(|line| line.starts_with("input:"))
        .any(|line| {
            line.split(':')
                .nth(3)
                .unwrap_or("")
                .split(',')
                .any(|u| u == user)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn default_profile_parses() {
        let p = parse_profile(default_profile_text()).unwrap();
        assert_eq!(p.swipe_config(), SwipeConfig::default());
        assert_eq!(p.binding("swipe.left"), Some("key:ALT+RIGHT"));
        assert_eq!(p.binding(ANY_SWIPE_BINDING), None);
    }

    #[test]
    fn display_name_prefers_meta_name() {
        let p = parse_profile("[meta]\nname = \"Reading\"\n").unwrap();
        assert_eq!(p.display_name("reader"), "Reading");
        assert_eq!(Profile::default().display_name("reader"), "reader");
    }

    #[test]
    fn missing_sections_fall_back() {
        let p = parse_profile("").unwrap();
        assert_eq!(p.swipe_config(), SwipeConfig::default());
        assert_eq!(p.tracking.smooth_ema, 0.6);
        assert!(p.bindings.is_empty());
    }

    #[test]
    fn swipe_section_is_read_leniently() {
        let p = parse_profile(
            r#"
            [swipe]
            velocity_threshold = 0.5
            detect_swipe_up = "maybe"
            wobble = 3
            "#,
        )
        .unwrap();
        let c = p.swipe_config();
        assert_eq!(c.velocity_threshold, 0.5);
        assert!(c.detect_swipe_up);
    }

    #[test]
    fn commands_need_permission() {
        let txt = r#"
            [bindings]
            swipe.up = "cmd:notify-send up"
        "#;
        let err = parse_profile(txt).unwrap_err();
        assert!(err.to_string().contains("allow_commands=false"));

        let allowed = format!("[meta]\nallow_commands = true\n{txt}");
        assert!(parse_profile(&allowed).is_ok());
    }

    #[test]
    fn invalid_actions_and_tracking_are_rejected() {
        assert!(parse_profile("[bindings]\nswipe.up = \"jump\"").is_err());
        assert!(parse_profile("[bindings]\nswipe.up = 3").is_err());
        assert!(parse_profile("[tracking]\nsmooth_ema = 0.0").is_err());
        assert!(parse_profile("[tracking]\nsmooth_ema = 1.5").is_err());
    }

    #[test]
    fn store_installs_default_and_switches_profiles() {
        let dir = TempDir::new().unwrap();
        let mut st = DaemonConfigState::load_or_install_in(dir.path().to_path_buf()).unwrap();
        assert_eq!(st.active_name, "default");
        assert!(st.active_profile_path().exists());

        fs::write(
            st.profiles_dir.join("reader.toml"),
            "[swipe]\ndetect_swipe_up = false\n",
        )
        .unwrap();
        assert_eq!(st.list_profiles(), vec!["default", "reader"]);

        st.set_active("reader").unwrap();
        assert!(!st.profile.swipe_config().detect_swipe_up);
        assert_eq!(
            fs::read_to_string(&st.active_ptr).unwrap(),
            "reader".to_string()
        );

        assert!(st.set_active("missing").is_err());
        assert!(st.set_active("../escape").is_err());
        assert_eq!(st.active_name, "reader");
    }

    #[test]
    fn reload_reverts_removed_overrides() {
        let dir = TempDir::new().unwrap();
        let mut st = DaemonConfigState::load_or_install_in(dir.path().to_path_buf()).unwrap();
        let path = st.active_profile_path();
        fs::write(&path, "[swipe]\nvelocity_threshold = 0.9\n").unwrap();
        st.reload().unwrap();
        assert_eq!(st.profile.swipe_config().velocity_threshold, 0.9);
        fs::write(&path, "[swipe]\n").unwrap();
        st.reload().unwrap();
        assert_eq!(st.profile.swipe_config().velocity_threshold, 0.3);
    }

    #[test]
    fn sync_from_disk_keeps_last_good_state_on_error() {
        let dir = TempDir::new().unwrap();
        let mut st = DaemonConfigState::load_or_install_in(dir.path().to_path_buf()).unwrap();
        fs::write(&st.active_ptr, "ghost").unwrap();
        assert!(st.sync_from_disk().is_err());
        assert_eq!(st.active_name, "default");

        fs::write(st.profiles_dir.join("ghost.toml"), "").unwrap();
        st.sync_from_disk().unwrap();
        assert_eq!(st.active_name, "ghost");
    }
}
