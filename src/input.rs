use std::collections::VecDeque;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Camera gesture produced by pointer or touch input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OrbitInput {
    /// Drag in window pixels.
    Rotate { dx: f32, dy: f32 },
    /// Scroll in lines; positive moves closer.
    Zoom(f32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    Orbit(OrbitInput),
    /// A key went down. Repeats are dropped.
    Key(KeyCode),
}

/// Window events translated into a queue the frame loop drains once per frame.
#[derive(Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
    dragging: bool,
    cursor: Option<Vec2>,
    touch: Option<(u64, Vec2)>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate a window event. Events that carry no input are ignored.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state == ElementState::Pressed && !event.repeat {
                        self.key_pressed(key);
                    }
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.pointer_button(*state == ElementState::Pressed),
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => self.cursor = None,
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                self.scroll(lines);
            }
            WindowEvent::Touch(touch) => {
                let position = Vec2::new(touch.location.x as f32, touch.location.y as f32);
                match touch.phase {
                    TouchPhase::Started => self.touch_started(touch.id, position),
                    TouchPhase::Moved => self.touch_moved(touch.id, position),
                    TouchPhase::Ended | TouchPhase::Cancelled => self.touch_ended(touch.id),
                }
            }
            _ => {}
        }
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    /// Take every queued event in arrival order.
    pub fn drain(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.drain(..)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn key_pressed(&mut self, key: KeyCode) {
        self.push(InputEvent::Key(key));
    }

    fn pointer_button(&mut self, pressed: bool) {
        self.dragging = pressed;
    }

    fn pointer_moved(&mut self, position: Vec2) {
        let last = self.cursor.replace(position);
        if let (Some(last), true) = (last, self.dragging) {
            self.push_rotate(position - last);
        }
    }

    fn scroll(&mut self, lines: f32) {
        if lines != 0.0 {
            self.push(InputEvent::Orbit(OrbitInput::Zoom(lines)));
        }
    }

    // Only the first finger down drives the camera.
    fn touch_started(&mut self, id: u64, position: Vec2) {
        if self.touch.is_none() {
            self.touch = Some((id, position));
        }
    }

    fn touch_moved(&mut self, id: u64, position: Vec2) {
        match self.touch {
            Some((active, last)) if active == id => {
                self.touch = Some((id, position));
                self.push_rotate(position - last);
            }
            _ => {}
        }
    }

    fn touch_ended(&mut self, id: u64) {
        if self.touch.is_some_and(|(active, _)| active == id) {
            self.touch = None;
        }
    }

    fn push_rotate(&mut self, delta: Vec2) {
        if delta != Vec2::ZERO {
            self.push(InputEvent::Orbit(OrbitInput::Rotate {
                dx: delta.x,
                dy: delta.y,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_without_button_queues_nothing() {
        let mut queue = InputQueue::new();
        queue.pointer_moved(Vec2::new(10.0, 10.0));
        queue.pointer_moved(Vec2::new(20.0, 15.0));
        assert!(queue.is_empty());
    }

    #[test]
    fn drag_queues_pixel_deltas() {
        let mut queue = InputQueue::new();
        queue.pointer_moved(Vec2::new(10.0, 10.0));
        queue.pointer_button(true);
        queue.pointer_moved(Vec2::new(14.0, 7.0));
        queue.pointer_button(false);
        queue.pointer_moved(Vec2::new(50.0, 50.0));

        let events: Vec<_> = queue.drain().collect();
        assert_eq!(
            events,
            vec![InputEvent::Orbit(OrbitInput::Rotate { dx: 4.0, dy: -3.0 })]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn events_drain_in_arrival_order() {
        let mut queue = InputQueue::new();
        queue.scroll(1.0);
        queue.key_pressed(KeyCode::KeyG);
        queue.scroll(0.0);
        queue.scroll(-2.0);

        let events: Vec<_> = queue.drain().collect();
        assert_eq!(
            events,
            vec![
                InputEvent::Orbit(OrbitInput::Zoom(1.0)),
                InputEvent::Key(KeyCode::KeyG),
                InputEvent::Orbit(OrbitInput::Zoom(-2.0)),
            ]
        );
    }

    #[test]
    fn second_finger_is_ignored() {
        let mut queue = InputQueue::new();
        queue.touch_started(1, Vec2::ZERO);
        queue.touch_started(2, Vec2::new(100.0, 100.0));
        queue.touch_moved(2, Vec2::new(110.0, 100.0));
        queue.touch_moved(1, Vec2::new(0.0, 5.0));
        queue.touch_ended(1);
        queue.touch_moved(1, Vec2::new(0.0, 50.0));

        let events: Vec<_> = queue.drain().collect();
        assert_eq!(
            events,
            vec![InputEvent::Orbit(OrbitInput::Rotate { dx: 0.0, dy: 5.0 })]
        );
    }
}
