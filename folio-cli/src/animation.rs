//! Frame loop that drives the particle field and cursor trail.
//!
//! The loop registers its listeners and one pending frame callback with a
//! [`FrameHost`] on mount, re-requests a frame from every frame it handles,
//! and hands everything back on [`AnimationLoop::unmount`].

use tracing::{debug, warn};

use crate::cursor::CursorTrail;
use crate::particles::ParticleField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    PointerMove,
    PointerButton,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    PointerMove { x: f32, y: f32, hovering: bool },
    PointerLeave,
    PointerDown,
    PointerUp,
    Resize { width: f32, height: f32 },
}

impl HostEvent {
    pub fn kind(&self) -> ListenerKind {
        match self {
            HostEvent::PointerMove { .. } | HostEvent::PointerLeave => ListenerKind::PointerMove,
            HostEvent::PointerDown | HostEvent::PointerUp => ListenerKind::PointerButton,
            HostEvent::Resize { .. } => ListenerKind::Resize,
        }
    }
}

/// Whatever schedules frames and delivers input events to the loop.
pub trait FrameHost {
    fn request_frame(&mut self) -> FrameId;
    fn cancel_frame(&mut self, id: FrameId);
    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId;
    fn remove_listener(&mut self, id: ListenerId);
}

const LISTENERS: [ListenerKind; 3] = [
    ListenerKind::PointerMove,
    ListenerKind::PointerButton,
    ListenerKind::Resize,
];

pub struct AnimationLoop {
    field: ParticleField,
    cursor: CursorTrail,
    pending_frame: Option<FrameId>,
    listeners: Vec<ListenerId>,
}

impl AnimationLoop {
    pub fn mount<H: FrameHost>(host: &mut H, field: ParticleField, cursor: CursorTrail) -> Self {
        let listeners = LISTENERS.iter().map(|kind| host.add_listener(*kind)).collect();
        let pending_frame = Some(host.request_frame());
        debug!("Animation loop mounted with {} particles", field.particles().len());
        Self {
            field,
            cursor,
            pending_frame,
            listeners,
        }
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn cursor(&self) -> &CursorTrail {
        &self.cursor
    }

    pub fn is_mounted(&self) -> bool {
        self.pending_frame.is_some() || !self.listeners.is_empty()
    }

    /// Runs frame `id` if it is the one this loop is waiting for.
    pub fn on_frame<H: FrameHost>(&mut self, host: &mut H, id: FrameId, dt: f32) {
        if self.pending_frame != Some(id) {
            return;
        }
        self.field.step();
        self.cursor.step(dt);
        self.pending_frame = Some(host.request_frame());
    }

    pub fn on_event(&mut self, event: HostEvent) {
        if self.listeners.is_empty() {
            return;
        }
        match event {
            HostEvent::PointerMove { x, y, hovering } => {
                self.field.set_pointer(x, y);
                self.cursor.move_to(x, y);
                self.cursor.set_hovering(hovering);
            }
            HostEvent::PointerLeave => {
                self.field.clear_pointer();
                self.cursor.hide();
            }
            HostEvent::PointerDown => self.cursor.set_clicked(true),
            HostEvent::PointerUp => self.cursor.set_clicked(false),
            HostEvent::Resize { width, height } => self.field.resize(width, height),
        }
    }

    pub fn set_music_mode(&mut self, music_mode: bool) {
        self.cursor.set_music_mode(music_mode);
    }

    /// Cancels the pending frame and removes every listener.
    pub fn unmount<H: FrameHost>(mut self, host: &mut H) {
        if let Some(id) = self.pending_frame.take() {
            host.cancel_frame(id);
        }
        for id in self.listeners.drain(..) {
            host.remove_listener(id);
        }
        debug!("Animation loop unmounted");
    }
}

impl Drop for AnimationLoop {
    fn drop(&mut self) {
        if self.is_mounted() {
            warn!("Animation loop dropped without unmount; host still holds its callbacks");
        }
    }
}

/// Frame host for the terminal UI: frames are released by the render tick,
/// events are forwarded only for registered listener kinds.
#[derive(Debug, Default)]
pub struct TerminalHost {
    next_id: u64,
    frames: Vec<FrameId>,
    listeners: Vec<(ListenerId, ListenerKind)>,
}

impl TerminalHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn wants(&self, kind: ListenerKind) -> bool {
        self.listeners.iter().any(|(_, k)| *k == kind)
    }

    /// Frames requested since the last tick; each fires once.
    pub fn take_due_frames(&mut self) -> Vec<FrameId> {
        std::mem::take(&mut self.frames)
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl FrameHost for TerminalHost {
    fn request_frame(&mut self) -> FrameId {
        let id = FrameId(self.next_id());
        self.frames.push(id);
        id
    }

    fn cancel_frame(&mut self, id: FrameId) {
        self.frames.retain(|frame| *frame != id);
    }

    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId {
        let id = ListenerId(self.next_id());
        self.listeners.push((id, kind));
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|(listener, _)| *listener != id);
    }
}
