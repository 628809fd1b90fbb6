use serde::Deserialize;

/// Raw control-bar input
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PttInput {
    PointerDown,
    PointerUp,
    PointerLeave,
    Key {
        code: String,
        pressed: bool,
        #[serde(default)]
        repeat: bool,
    },
}

impl PttInput {
    pub fn space(pressed: bool, repeat: bool) -> Self {
        Self::Key {
            code: SPACE.to_string(),
            pressed,
            repeat,
        }
    }
}

pub const SPACE: &str = "Space";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PttAction {
    Press,
    Release,
}

/// Turns pointer and spacebar input into edge-triggered press/release.
///
/// Auto-repeated key-downs never re-trigger acquisition, even when the
/// platform does not flag them as repeats.
#[derive(Debug, Default)]
pub struct InputLatch {
    space_held: bool,
    pointer_held: bool,
}

impl InputLatch {
    pub fn apply(&mut self, input: &PttInput) -> Option<PttAction> {
        match input {
            PttInput::PointerDown => {
                self.pointer_held = true;
                Some(PttAction::Press)
            }
            PttInput::PointerUp => {
                self.pointer_held = false;
                Some(PttAction::Release)
            }
            PttInput::PointerLeave => {
                if std::mem::take(&mut self.pointer_held) {
                    Some(PttAction::Release)
                } else {
                    None
                }
            }
            PttInput::Key { code, .. } if code != SPACE => None,
            PttInput::Key {
                pressed: true,
                repeat,
                ..
            } => {
                if *repeat || self.space_held {
                    return None;
                }
                self.space_held = true;
                Some(PttAction::Press)
            }
            PttInput::Key { pressed: false, .. } => {
                self.space_held = false;
                Some(PttAction::Release)
            }
        }
    }
}
