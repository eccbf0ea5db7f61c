use anyhow::{anyhow, Result};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyAction {
    ToggleRecording,
}

impl HotkeyAction {
    pub fn display_name(&self) -> &'static str {
        match self {
            HotkeyAction::ToggleRecording => "Start/Stop Recording",
        }
    }
}

pub struct HotkeyManager {
    manager: GlobalHotKeyManager,
    registered: HashMap<u32, (HotkeyAction, HotKey)>,
}

impl HotkeyManager {
    pub fn new() -> Result<Self> {
        let manager = GlobalHotKeyManager::new()
            .map_err(|e| anyhow!("Failed to create hotkey manager: {}", e))?;

        Ok(Self {
            manager,
            registered: HashMap::new(),
        })
    }

    pub fn register(&mut self, action: HotkeyAction, hotkey_str: &str) -> Result<()> {
        let hotkey = parse_hotkey(hotkey_str)?;
        self.manager
            .register(hotkey)
            .map_err(|e| anyhow!("Failed to register hotkey {}: {}", hotkey_str, e))?;

        self.registered.insert(hotkey.id(), (action, hotkey));
        tracing::debug!("Registered {} as {}", action.display_name(), hotkey_str);
        Ok(())
    }

    pub fn unregister_all(&mut self) {
        for (_, (_, hotkey)) in self.registered.drain() {
            let _ = self.manager.unregister(hotkey);
        }
    }

    /// Next pressed hotkey, ignoring key releases.
    pub fn poll(&self) -> Option<HotkeyAction> {
        while let Ok(event) = GlobalHotKeyEvent::receiver().try_recv() {
            if event.state == HotKeyState::Pressed {
                if let Some((action, _)) = self.registered.get(&event.id) {
                    return Some(*action);
                }
            }
        }
        None
    }
}

impl Drop for HotkeyManager {
    fn drop(&mut self) {
        self.unregister_all();
    }
}

const KEY_NAMES: &[(&str, Code)] = &[
    ("A", Code::KeyA),
    ("B", Code::KeyB),
    ("C", Code::KeyC),
    ("D", Code::KeyD),
    ("E", Code::KeyE),
    ("F", Code::KeyF),
    ("G", Code::KeyG),
    ("H", Code::KeyH),
    ("I", Code::KeyI),
    ("J", Code::KeyJ),
    ("K", Code::KeyK),
    ("L", Code::KeyL),
    ("M", Code::KeyM),
    ("N", Code::KeyN),
    ("O", Code::KeyO),
    ("P", Code::KeyP),
    ("Q", Code::KeyQ),
    ("R", Code::KeyR),
    ("S", Code::KeyS),
    ("T", Code::KeyT),
    ("U", Code::KeyU),
    ("V", Code::KeyV),
    ("W", Code::KeyW),
    ("X", Code::KeyX),
    ("Y", Code::KeyY),
    ("Z", Code::KeyZ),
    ("0", Code::Digit0),
    ("1", Code::Digit1),
    ("2", Code::Digit2),
    ("3", Code::Digit3),
    ("4", Code::Digit4),
    ("5", Code::Digit5),
    ("6", Code::Digit6),
    ("7", Code::Digit7),
    ("8", Code::Digit8),
    ("9", Code::Digit9),
    ("F1", Code::F1),
    ("F2", Code::F2),
    ("F3", Code::F3),
    ("F4", Code::F4),
    ("F5", Code::F5),
    ("F6", Code::F6),
    ("F7", Code::F7),
    ("F8", Code::F8),
    ("F9", Code::F9),
    ("F10", Code::F10),
    ("F11", Code::F11),
    ("F12", Code::F12),
    ("Space", Code::Space),
    ("Enter", Code::Enter),
    ("Esc", Code::Escape),
    ("Home", Code::Home),
    ("End", Code::End),
    ("Insert", Code::Insert),
    ("Delete", Code::Delete),
    ("PrintScreen", Code::PrintScreen),
];

const KEY_ALIASES: &[(&str, &str)] = &[
    ("ESCAPE", "ESC"),
    ("RETURN", "ENTER"),
    ("DEL", "DELETE"),
    ("INS", "INSERT"),
    ("PRTSC", "PRINTSCREEN"),
    ("PRINT", "PRINTSCREEN"),
];

fn parse_hotkey(s: &str) -> Result<HotKey> {
    let mut modifiers = Modifiers::empty();
    let mut key_code: Option<Code> = None;

    for part in s.split('+').map(str::trim).filter(|p| !p.is_empty()) {
        match part.to_lowercase().as_str() {
            "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
            "alt" => modifiers |= Modifiers::ALT,
            "shift" => modifiers |= Modifiers::SHIFT,
            "super" | "win" | "meta" | "cmd" => modifiers |= Modifiers::SUPER,
            _ => {
                if key_code.is_some() {
                    return Err(anyhow!("More than one key in hotkey: {}", s));
                }
                key_code = Some(parse_key_code(part)?);
            }
        }
    }

    let code = key_code.ok_or_else(|| anyhow!("No key specified in hotkey"))?;
    Ok(HotKey::new(Some(modifiers), code))
}

fn parse_key_code(s: &str) -> Result<Code> {
    let upper = s.to_uppercase();
    let name = KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == upper)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(upper.as_str());

    KEY_NAMES
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, code)| *code)
        .ok_or_else(|| anyhow!("Unknown key: {}", s))
}

pub fn format_code(code: Code) -> &'static str {
    KEY_NAMES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
        .unwrap_or("?")
}

pub fn format_hotkey(modifiers: Modifiers, code: Code) -> String {
    let mut parts = Vec::new();

    if modifiers.contains(Modifiers::CONTROL) {
        parts.push("Ctrl");
    }
    if modifiers.contains(Modifiers::ALT) {
        parts.push("Alt");
    }
    if modifiers.contains(Modifiers::SHIFT) {
        parts.push("Shift");
    }
    if modifiers.contains(Modifiers::SUPER) {
        #[cfg(target_os = "macos")]
        parts.push("Cmd");
        #[cfg(not(target_os = "macos"))]
        parts.push("Win");
    }

    parts.push(format_code(code));
    parts.join("+")
}

/// Normalizes a user-entered hotkey, leaving unparsable input unchanged.
pub fn format_hotkey_string(s: &str) -> String {
    match parse_hotkey(s) {
        Ok(hotkey) => format_hotkey(hotkey.mods, hotkey.key),
        Err(_) => s.to_string(),
    }
}
