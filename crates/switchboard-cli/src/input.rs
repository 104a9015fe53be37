//! evdev adapter: opens the hardware device and turns raw kernel events
//! into dispatchable input events.

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context};
use evdev::{Device, EventType, InputEvent as RawEvent};
use switchboard_core::config::{DeviceConfig, EncoderConfig};
use switchboard_core::event::{EventSource, InputEvent};
use tracing::{info, warn};

/// Event codes the encoder occupies, taken from the config. Any other
/// key code is treated as a discrete button.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderCodes {
    pub up: Option<u16>,
    pub down: Option<u16>,
    pub rel: Option<u16>,
}

impl EncoderCodes {
    pub fn from_config(encoder: Option<&EncoderConfig>) -> Self {
        match encoder {
            Some(e) => Self {
                up: e.up,
                down: e.down,
                rel: e.rel,
            },
            None => Self::default(),
        }
    }
}

/// Maps one raw event to zero or more dispatchable events.
///
/// Only key-down transitions count; releases and autorepeats are noise.
/// A relative event of magnitude N is N detents, emitted individually so
/// a fast twist loses no clicks.
fn classify(event: &RawEvent, codes: &EncoderCodes, out: &mut VecDeque<InputEvent>) {
    match event.event_type() {
        EventType::KEY => {
            if event.value() != 1 {
                return;
            }
            let code = event.code();
            if Some(code) == codes.up {
                out.push_back(InputEvent::incremental(code, 1));
            } else if Some(code) == codes.down {
                out.push_back(InputEvent::incremental(code, -1));
            } else {
                out.push_back(InputEvent::discrete(code));
            }
        }
        EventType::RELATIVE => {
            let code = event.code();
            if Some(code) != codes.rel {
                return;
            }
            let direction = if event.value() > 0 { 1 } else { -1 };
            for _ in 0..event.value().unsigned_abs() {
                out.push_back(InputEvent::incremental(code, direction));
            }
        }
        _ => {}
    }
}

/// Blocking event source backed by an open evdev device.
pub struct EvdevSource {
    device: Device,
    codes: EncoderCodes,
    pending: VecDeque<InputEvent>,
}

impl EvdevSource {
    pub fn new(device: Device, codes: EncoderCodes) -> Self {
        Self {
            device,
            codes,
            pending: VecDeque::new(),
        }
    }
}

impl EventSource for EvdevSource {
    fn next_event(&mut self) -> io::Result<Option<InputEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            // One kernel report can carry several events; classify the
            // whole batch and drain it before blocking again.
            let events = self.device.fetch_events()?;
            for raw in events {
                classify(&raw, &self.codes, &mut self.pending);
            }
        }
    }
}

/// A key-capable input device, as listed by `switchboard devices`.
pub struct DeviceEntry {
    pub path: PathBuf,
    pub name: String,
}

pub fn list_key_devices() -> Vec<DeviceEntry> {
    let mut entries: Vec<DeviceEntry> = evdev::enumerate()
        .filter(|(_, device)| device.supported_events().contains(EventType::KEY))
        .map(|(path, device)| DeviceEntry {
            name: device.name().unwrap_or("(unnamed)").to_string(),
            path,
        })
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}

/// Opens the configured device: an explicit path wins, then an exact name
/// match, then the first key-capable device on the system.
pub fn open_device(config: &DeviceConfig) -> anyhow::Result<Device> {
    if let Some(path) = &config.path {
        return Device::open(path)
            .with_context(|| format!("failed to open input device {}", path.display()));
    }

    let candidates = list_key_devices();
    if candidates.is_empty() {
        bail!("no key-capable input devices found (check /dev/input permissions)");
    }

    if let Some(name) = &config.name {
        if let Some(entry) = candidates.iter().find(|e| e.name == *name) {
            return Device::open(&entry.path)
                .with_context(|| format!("failed to open input device {}", entry.path.display()));
        }
        for entry in &candidates {
            info!(path = %entry.path.display(), name = %entry.name, "available device");
        }
        bail!("input device named '{name}' not found");
    }

    let first = &candidates[0];
    warn!(
        path = %first.path.display(),
        name = %first.name,
        "no device configured, using first key-capable device"
    );
    Device::open(&first.path)
        .with_context(|| format!("failed to open input device {}", first.path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::event::EventKind;

    fn codes() -> EncoderCodes {
        EncoderCodes {
            up: Some(225),
            down: Some(224),
            rel: Some(7),
        }
    }

    fn classify_one(event: RawEvent, codes: &EncoderCodes) -> Vec<InputEvent> {
        let mut out = VecDeque::new();
        classify(&event, codes, &mut out);
        out.into_iter().collect()
    }

    #[test]
    fn key_down_maps_to_discrete_event() {
        let out = classify_one(RawEvent::new(EventType::KEY, 193, 1), &codes());
        assert_eq!(out, vec![InputEvent::discrete(193)]);
    }

    #[test]
    fn key_release_is_ignored() {
        let out = classify_one(RawEvent::new(EventType::KEY, 193, 0), &codes());
        assert!(out.is_empty());
    }

    #[test]
    fn key_autorepeat_is_ignored() {
        let out = classify_one(RawEvent::new(EventType::KEY, 193, 2), &codes());
        assert!(out.is_empty());
    }

    #[test]
    fn encoder_up_key_maps_to_positive_increment() {
        let out = classify_one(RawEvent::new(EventType::KEY, 225, 1), &codes());
        assert_eq!(out, vec![InputEvent::incremental(225, 1)]);
    }

    #[test]
    fn encoder_down_key_maps_to_negative_increment() {
        let out = classify_one(RawEvent::new(EventType::KEY, 224, 1), &codes());
        assert_eq!(out, vec![InputEvent::incremental(224, -1)]);
    }

    #[test]
    fn relative_event_emits_one_increment_per_detent() {
        let out = classify_one(RawEvent::new(EventType::RELATIVE, 7, 3), &codes());
        assert_eq!(out.len(), 3);
        for event in &out {
            assert_eq!(event.kind, EventKind::Incremental { direction: 1 });
        }
    }

    #[test]
    fn negative_relative_event_emits_negative_increments() {
        let out = classify_one(RawEvent::new(EventType::RELATIVE, 7, -2), &codes());
        assert_eq!(out.len(), 2);
        for event in &out {
            assert_eq!(event.kind, EventKind::Incremental { direction: -1 });
        }
    }

    #[test]
    fn unconfigured_relative_axis_is_ignored() {
        let out = classify_one(RawEvent::new(EventType::RELATIVE, 8, 3), &codes());
        assert!(out.is_empty());
    }

    #[test]
    fn synchronization_events_are_ignored() {
        let out = classify_one(RawEvent::new(EventType::SYNCHRONIZATION, 0, 0), &codes());
        assert!(out.is_empty());
    }

    #[test]
    fn without_encoder_config_every_key_is_discrete() {
        let codes = EncoderCodes::default();
        let out = classify_one(RawEvent::new(EventType::KEY, 225, 1), &codes);
        assert_eq!(out, vec![InputEvent::discrete(225)]);
    }
}
