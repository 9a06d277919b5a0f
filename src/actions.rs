//! Binding actions and the uinput sink that performs them.

use anyhow::Result;
use log::{info, warn};
use std::process::Command;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAxis {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyToken {
    Ctrl,
    Alt,
    Shift,
    Super,
    Tab,
    Esc,
    Enter,
    Space,
    Minus,
    Equal,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
}

impl FromStr for KeyToken {
    type Err = ActionError;

    fn from_str(tok: &str) -> Result<Self, Self::Err> {
        let k = match tok.trim().to_ascii_uppercase().as_str() {
            "CTRL" | "CONTROL" => Self::Ctrl,
            "ALT" => Self::Alt,
            "SHIFT" => Self::Shift,
            "SUPER" | "META" | "WIN" => Self::Super,
            "TAB" => Self::Tab,
            "ESC" | "ESCAPE" => Self::Esc,
            "ENTER" | "RETURN" => Self::Enter,
            "SPACE" => Self::Space,
            "MINUS" | "-" => Self::Minus,
            "EQUAL" | "=" => Self::Equal,
            "LEFT" => Self::Left,
            "RIGHT" => Self::Right,
            "UP" => Self::Up,
            "DOWN" => Self::Down,
            "PAGEUP" | "PGUP" => Self::PageUp,
            "PAGEDOWN" | "PGDN" => Self::PageDown,
            "HOME" => Self::Home,
            "END" => Self::End,
            other => return Err(ActionError::UnknownKey(other.to_string())),
        };
        Ok(k)
    }
}

/// What a binding string asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Mouse(MouseButton),
    Scroll { axis: ScrollAxis, steps: i32 },
    Key(Vec<KeyToken>),
    Command(String),
    Toggle,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("empty action")]
    Empty,
    #[error("unknown mouse button: {0}")]
    UnknownButton(String),
    #[error("invalid scroll action '{0}', expected <vertical|horizontal>@<steps>")]
    InvalidScroll(String),
    #[error("unsupported key token: {0}")]
    UnknownKey(String),
    #[error("empty command")]
    EmptyCommand,
    #[error("unknown action '{0}'")]
    Unknown(String),
}

impl FromStr for Action {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ActionError::Empty);
        }
        if s == "toggle" {
            return Ok(Self::Toggle);
        }
        if let Some(rest) = s.strip_prefix("mouse:") {
            let b = match rest.trim().to_ascii_lowercase().as_str() {
                "left" => MouseButton::Left,
                "right" => MouseButton::Right,
                "middle" => MouseButton::Middle,
                other => return Err(ActionError::UnknownButton(other.to_string())),
            };
            return Ok(Self::Mouse(b));
        }
        if let Some(rest) = s.strip_prefix("scroll:") {
            let bad = || ActionError::InvalidScroll(rest.to_string());
            let (axis, steps) = rest.split_once('@').unwrap_or((rest, "+1"));
            let axis = match axis.trim().to_ascii_lowercase().as_str() {
                "vertical" | "" => ScrollAxis::Vertical,
                "horizontal" => ScrollAxis::Horizontal,
                _ => return Err(bad()),
            };
            let steps: i32 = steps.trim().parse().map_err(|_| bad())?;
            return Ok(Self::Scroll { axis, steps });
        }
        if let Some(rest) = s.strip_prefix("key:") {
            let keys = rest
                .split('+')
                .map(KeyToken::from_str)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self::Key(keys));
        }
        if let Some(rest) = s.strip_prefix("cmd:") {
            let cmd = rest.trim();
            if cmd.is_empty() {
                return Err(ActionError::EmptyCommand);
            }
            return Ok(Self::Command(cmd.to_string()));
        }
        Err(ActionError::Unknown(s.to_string()))
    }
}

pub struct ActionSink {
    enabled: bool,
    linux: Option<Box<LinuxUinput>>,
}

impl std::fmt::Debug for ActionSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSink")
            .field("enabled", &self.enabled)
            .field("uinput", &self.linux.is_some())
            .finish()
    }
}

impl ActionSink {
    pub fn new() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create()?;
            return Ok(Self {
                enabled: true,
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self::noop())
        }
    }

    pub fn noop() -> Self {
        Self {
            enabled: true,
            linux: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, en: bool) {
        self.enabled = en;
    }

    /// Perform one action. While disabled only `toggle` has an effect.
    pub fn perform(&mut self, action: &Action) -> Result<()> {
        if let Action::Toggle = action {
            self.enabled = !self.enabled;
            info!(
                "actions {}",
                if self.enabled { "enabled" } else { "disabled" }
            );
            return Ok(());
        }
        if !self.enabled {
            return Ok(());
        }
        match action {
            Action::Command(cmd) => {
                let child = Command::new("sh").arg("-c").arg(cmd).spawn()?;
                info!("spawned '{cmd}' (pid={})", child.id());
                Ok(())
            }
            other => self.emit(other),
        }
    }

    #[cfg(target_os = "linux")]
    fn emit(&mut self, action: &Action) -> Result<()> {
        let Some(dev) = self.linux.as_mut() else {
            return Ok(());
        };
        match action {
            Action::Mouse(b) => dev.click(*b),
            Action::Scroll { axis, steps } => dev.scroll(*axis, *steps),
            Action::Key(keys) => dev.chord(keys),
            Action::Command(_) | Action::Toggle => Ok(()),
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn emit(&mut self, _action: &Action) -> Result<()> {
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn uinput_key(tok: KeyToken) -> uinput::event::keyboard::Key {
    use uinput::event::keyboard::Key as K;
    match tok {
        KeyToken::Ctrl => K::LeftControl,
        KeyToken::Alt => K::LeftAlt,
        KeyToken::Shift => K::LeftShift,
        KeyToken::Super => K::LeftMeta,
        KeyToken::Tab => K::Tab,
        KeyToken::Esc => K::Esc,
        KeyToken::Enter => K::Enter,
        KeyToken::Space => K::Space,
        KeyToken::Minus => K::Minus,
        KeyToken::Equal => K::Equal,
        KeyToken::Left => K::Left,
        KeyToken::Right => K::Right,
        KeyToken::Up => K::Up,
        KeyToken::Down => K::Down,
        KeyToken::PageUp => K::PageUp,
        KeyToken::PageDown => K::PageDown,
        KeyToken::Home => K::Home,
        KeyToken::End => K::End,
    }
}

#[cfg(target_os = "linux")]
const CHORD_KEYS: [KeyToken; 18] = [
    KeyToken::Ctrl,
    KeyToken::Alt,
    KeyToken::Shift,
    KeyToken::Super,
    KeyToken::Tab,
    KeyToken::Esc,
    KeyToken::Enter,
    KeyToken::Space,
    KeyToken::Minus,
    KeyToken::Equal,
    KeyToken::Left,
    KeyToken::Right,
    KeyToken::Up,
    KeyToken::Down,
    KeyToken::PageUp,
    KeyToken::PageDown,
    KeyToken::Home,
    KeyToken::End,
];

#[cfg(not(target_os = "linux"))]
struct LinuxUinput;

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self> {
        use uinput::event::{controller::Mouse, relative};

        let mut builder = uinput::default()?
            .name("Swipectl Virtual Input")?
            .event(relative::Position::X)?
            .event(relative::Position::Y)?
            .event(relative::Wheel::Vertical)?
            .event(relative::Wheel::Horizontal)?
            .event(Mouse::Left)?
            .event(Mouse::Right)?
            .event(Mouse::Middle)?;
        for k in CHORD_KEYS {
            builder = builder.event(uinput_key(k))?;
        }
        let dev = builder.create()?;

        info!("uinput: created virtual device");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn click(&mut self, b: MouseButton) -> Result<()> {
        use uinput::event::controller::Mouse;
        let button = || match b {
            MouseButton::Left => Mouse::Left,
            MouseButton::Right => Mouse::Right,
            MouseButton::Middle => Mouse::Middle,
        };
        self.dev.send(button(), 1)?;
        self.sync()?;
        self.dev.send(button(), 0)?;
        self.sync()
    }

    fn scroll(&mut self, axis: ScrollAxis, steps: i32) -> Result<()> {
        use uinput::event::relative::Wheel;
        let wheel = match axis {
            ScrollAxis::Vertical => Wheel::Vertical,
            ScrollAxis::Horizontal => Wheel::Horizontal,
        };
        self.dev.send(wheel, steps)?;
        self.sync()
    }

    fn chord(&mut self, keys: &[KeyToken]) -> Result<()> {
        // press in order, release in reverse
        for k in keys {
            self.dev.send(uinput_key(*k), 1)?;
        }
        self.sync()?;
        for k in keys.iter().rev() {
            self.dev.send(uinput_key(*k), 0)?;
        }
        self.sync()
    }
}
