//! The Overlay View Model (C10): observable UI state, no windowing dependency.
//!
//! A plain `tokio::sync::watch` pair, the same notification mechanism `justwhisper-audio`'s
//! `DeviceRegistry` uses for hot-plug. The Tauri shell subscribes and calls
//! `window.emit`/`app.emit`, mirroring the teacher's `emit_status`/`emit_mic_level` pair.

use justwhisper_core::OverlayAppearance;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayState {
    Idle,
    Recording { level: f32 },
    Thinking,
    Message { kind: MessageKind, text: String },
}

#[derive(Clone)]
pub struct OverlayViewModel {
    state_tx: watch::Sender<OverlayState>,
    appearance_tx: watch::Sender<OverlayAppearance>,
}

impl OverlayViewModel {
    pub fn new(appearance: OverlayAppearance) -> Self {
        let (state_tx, _) = watch::channel(OverlayState::Idle);
        let (appearance_tx, _) = watch::channel(appearance);
        Self { state_tx, appearance_tx }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<OverlayState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_appearance(&self) -> watch::Receiver<OverlayAppearance> {
        self.appearance_tx.subscribe()
    }

    pub fn current_state(&self) -> OverlayState {
        self.state_tx.borrow().clone()
    }

    pub fn set_idle(&self) {
        let _ = self.state_tx.send(OverlayState::Idle);
    }

    pub fn set_recording(&self, level: f32) {
        let _ = self.state_tx.send(OverlayState::Recording { level: level.clamp(0.0, 1.0) });
    }

    pub fn set_thinking(&self) {
        let _ = self.state_tx.send(OverlayState::Thinking);
    }

    pub fn set_message(&self, kind: MessageKind, text: impl Into<String>) {
        let _ = self.state_tx.send(OverlayState::Message { kind, text: text.into() });
    }

    /// §4.8 overlay-appearance-reapply rule: called with the latest C1 snapshot on every
    /// `Hidden -> Recording` transition, before the overlay is shown.
    pub fn apply_appearance(&self, appearance: OverlayAppearance) {
        let _ = self.appearance_tx.send(appearance.clamp_opacity());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use justwhisper_core::OverlayAppearance;

    #[test]
    fn starts_idle() {
        let vm = OverlayViewModel::new(OverlayAppearance::default());
        assert_eq!(vm.current_state(), OverlayState::Idle);
    }

    #[test]
    fn recording_level_is_clamped() {
        let vm = OverlayViewModel::new(OverlayAppearance::default());
        vm.set_recording(1.7);
        assert_eq!(vm.current_state(), OverlayState::Recording { level: 1.0 });
    }

    #[test]
    fn applied_appearance_clamps_opacity() {
        let vm = OverlayViewModel::new(OverlayAppearance::default());
        let mut rx = vm.subscribe_appearance();
        let mut wild = OverlayAppearance::default();
        wild.opacity = 5.0;
        vm.apply_appearance(wild);
        rx.mark_changed();
        assert!(rx.borrow_and_update().opacity <= 1.0);
    }
}
