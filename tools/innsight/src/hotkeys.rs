#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub key: char,
    pub action: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Quit,
    ScrollDown,
    ScrollUp,
    NextMachine,
    PrevMachine,
    SelectMachine,
    RefreshStatus,
    Logout,
}

pub const CONSOLE_BINDINGS: [HotkeyBinding; 7] = [
    HotkeyBinding {
        key: 'q',
        action: "quit",
    },
    HotkeyBinding {
        key: 'j',
        action: "scroll down",
    },
    HotkeyBinding {
        key: 'k',
        action: "scroll up",
    },
    HotkeyBinding {
        key: 'n',
        action: "next machine",
    },
    HotkeyBinding {
        key: 'p',
        action: "prev machine",
    },
    HotkeyBinding {
        key: 'r',
        action: "refresh status",
    },
    HotkeyBinding {
        key: 'x',
        action: "sign out",
    },
];

pub fn console_controls_legend() -> String {
    format_bindings("Keys: ", &CONSOLE_BINDINGS)
}

pub fn action_for_key(key: char) -> Option<HotkeyAction> {
    match key {
        'q' => Some(HotkeyAction::Quit),
        'j' => Some(HotkeyAction::ScrollDown),
        'k' => Some(HotkeyAction::ScrollUp),
        'n' => Some(HotkeyAction::NextMachine),
        'p' => Some(HotkeyAction::PrevMachine),
        '\n' => Some(HotkeyAction::SelectMachine),
        'r' => Some(HotkeyAction::RefreshStatus),
        'x' => Some(HotkeyAction::Logout),
        _ => None,
    }
}

fn format_bindings(prefix: &str, bindings: &[HotkeyBinding]) -> String {
    let parts = bindings
        .iter()
        .map(|binding| format!("{} {}", binding.key, binding.action))
        .collect::<Vec<_>>();
    format!("{prefix}{}", parts.join("  "))
}
