use evdev::{Device, EventType, InputEventKind, Key};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::keymaps::KeyMap;
use super::{KeyHandler, KeyboardEvent, Subscription};
use crate::error::{EngineError, Result};

const INPUT_DIR: &str = "/dev/input";

/// Time udev needs to set permissions on a freshly created node
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Messages funnelled into the dispatcher thread
#[derive(Debug)]
enum Internal {
    Key(Key, i32),
    DeviceAdded(PathBuf),
    /// A reader exited or a new node turned out not to be a usable keyboard
    DeviceRemoved(PathBuf),
    Shutdown,
}

/// Global key hook reading every keyboard under `/dev/input`
///
/// One reader thread per device feeds a single dispatcher thread, which owns
/// the handler, so events reach it strictly in arrival order.
pub struct KeyboardMonitor {
    layout: String,
}

impl KeyboardMonitor {
    pub fn new(layout: impl Into<String>) -> Self {
        Self {
            layout: layout.into(),
        }
    }

    pub fn subscribe(&self, handler: KeyHandler) -> Result<Box<dyn Subscription>> {
        let devices = Self::find_keyboard_devices()?;

        if devices.is_empty() {
            log::info!("No keyboard devices found immediately. Waiting for hot-plug events...");
        } else {
            log::info!("Found {} keyboard device(s)", devices.len());
            for (device, path) in &devices {
                log::debug!("  - {} ({:?})", device.name().unwrap_or("Unknown"), path);
            }
        }

        let (tx, rx) = mpsc::channel::<Internal>(256);
        let stopped = Arc::new(AtomicBool::new(false));

        let mut monitored = HashSet::new();
        for (device, path) in devices {
            monitored.insert(path.clone());
            spawn_reader(device, path, tx.clone(), stopped.clone());
        }

        let watcher = Self::setup_watcher(tx.clone())
            .map_err(|e| EngineError::Subscription(format!("cannot watch {INPUT_DIR}: {e}")))?;

        let dispatcher = Dispatcher {
            handler,
            keymap: KeyMap::new(&self.layout),
            state: ModifierState::default(),
            monitored,
            tx: tx.clone(),
            stopped: stopped.clone(),
        };
        std::thread::Builder::new()
            .name("qsnip-listener".to_string())
            .spawn(move || dispatcher.run(rx))
            .map_err(|e| EngineError::Subscription(format!("cannot spawn listener: {e}")))?;

        Ok(Box::new(MonitorSubscription {
            tx,
            stopped,
            _watcher: watcher,
        }))
    }

    /// Find all keyboard devices in /dev/input/
    ///
    /// Fails only when keyboards exist but none can be opened, which on
    /// Linux means the user lacks access to the input group.
    fn find_keyboard_devices() -> Result<Vec<(Device, PathBuf)>> {
        let entries = std::fs::read_dir(INPUT_DIR)
            .map_err(|e| EngineError::Subscription(format!("cannot read {INPUT_DIR}: {e}")))?;

        let mut keyboards = Vec::new();
        let mut denied = 0usize;

        for entry in entries.flatten() {
            let path = entry.path();
            if !is_event_node(&path) {
                continue;
            }

            match Device::open(&path) {
                Ok(device) if Self::is_keyboard(&device) => keyboards.push((device, path)),
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::PermissionDenied => denied += 1,
                Err(e) => log::trace!("Could not open {:?}: {}", path, e),
            }
        }

        if keyboards.is_empty() && denied > 0 {
            return Err(EngineError::Subscription(format!(
                "permission denied on {denied} input device(s); add the user to the 'input' group"
            )));
        }

        Ok(keyboards)
    }

    /// A keyboard has letter keys plus Enter and Space; ydotool's own virtual
    /// device is skipped so synthetic output is never read back
    fn is_keyboard(device: &Device) -> bool {
        if device
            .name()
            .is_some_and(|name| name.to_lowercase().contains("ydotool"))
        {
            return false;
        }

        let Some(supported_keys) = device.supported_keys() else {
            return false;
        };

        supported_keys.contains(Key::KEY_A)
            && supported_keys.contains(Key::KEY_Z)
            && supported_keys.contains(Key::KEY_ENTER)
            && supported_keys.contains(Key::KEY_SPACE)
    }

    /// Watch /dev/input for new devices
    fn setup_watcher(tx: mpsc::Sender<Internal>) -> notify::Result<RecommendedWatcher> {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let Ok(event) = res else {
                    return;
                };
                if !event.kind.is_create() {
                    return;
                }
                for path in event.paths {
                    if is_event_node(&path) {
                        let _ = tx.blocking_send(Internal::DeviceAdded(path));
                    }
                }
            },
            NotifyConfig::default(),
        )?;

        watcher.watch(Path::new(INPUT_DIR), RecursiveMode::NonRecursive)?;
        log::debug!("Watching {} for new devices", INPUT_DIR);
        Ok(watcher)
    }
}

fn is_event_node(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with("event"))
}

/// Read events from a single device (runs in its own blocking thread)
///
/// When the device goes away the path is reported back so a replug on the
/// same node is picked up again.
fn spawn_reader(mut device: Device, path: PathBuf, tx: mpsc::Sender<Internal>, stopped: Arc<AtomicBool>) {
    std::thread::spawn(move || loop {
        let events = match device.fetch_events() {
            Ok(events) => events,
            Err(e) => {
                log::debug!("Device reader for {:?} stopped: {}", path, e);
                if !stopped.load(Ordering::Acquire) {
                    let _ = tx.blocking_send(Internal::DeviceRemoved(path));
                }
                return;
            }
        };

        for event in events {
            if event.event_type() != EventType::KEY {
                continue;
            }
            if let InputEventKind::Key(key) = event.kind() {
                if stopped.load(Ordering::Acquire)
                    || tx.blocking_send(Internal::Key(key, event.value())).is_err()
                {
                    return;
                }
            }
        }
    });
}

struct MonitorSubscription {
    tx: mpsc::Sender<Internal>,
    stopped: Arc<AtomicBool>,
    _watcher: RecommendedWatcher,
}

impl Subscription for MonitorSubscription {
    fn unsubscribe(self: Box<Self>) {
        self.stopped.store(true, Ordering::Release);
        // Wakes the dispatcher if idle; a full queue means it is awake anyway
        let _ = self.tx.try_send(Internal::Shutdown);
        log::debug!("Keyboard monitor unsubscribed");
    }
}

/// Modifier keys currently held
#[derive(Debug, Default, Clone, Copy)]
struct ModifierState {
    shift: bool,
    ctrl: bool,
    alt: bool,
    meta: bool,
    caps_lock: bool,
}

impl ModifierState {
    /// Classify one raw key event; `None` means the engine should not see it
    ///
    /// `value` is 0 for release, 1 for press, 2 for autorepeat.
    fn translate(&mut self, key: Key, value: i32, keymap: &KeyMap) -> Option<KeyboardEvent> {
        let pressed = value != 0;
        match key {
            Key::KEY_LEFTSHIFT | Key::KEY_RIGHTSHIFT => {
                self.shift = pressed;
                return (value == 1).then_some(KeyboardEvent::Shift);
            }
            Key::KEY_LEFTCTRL | Key::KEY_RIGHTCTRL => {
                self.ctrl = pressed;
                return (value == 1).then_some(KeyboardEvent::Control);
            }
            Key::KEY_LEFTALT | Key::KEY_RIGHTALT => {
                self.alt = pressed;
                return (value == 1).then_some(KeyboardEvent::Other);
            }
            Key::KEY_LEFTMETA | Key::KEY_RIGHTMETA => {
                self.meta = pressed;
                return (value == 1).then_some(KeyboardEvent::Other);
            }
            Key::KEY_CAPSLOCK => {
                if value == 1 {
                    self.caps_lock = !self.caps_lock;
                }
                return None;
            }
            _ => {}
        }

        let editing = matches!(
            key,
            Key::KEY_BACKSPACE | Key::KEY_DELETE | Key::KEY_LEFT | Key::KEY_RIGHT
        );
        // Releases never count; repeats only for editing keys
        if value == 0 || (value == 2 && !editing) {
            return None;
        }

        let event = match key {
            Key::KEY_BACKSPACE => KeyboardEvent::Backspace,
            Key::KEY_DELETE => KeyboardEvent::Delete,
            Key::KEY_LEFT => KeyboardEvent::Left,
            Key::KEY_RIGHT => KeyboardEvent::Right,
            Key::KEY_ENTER | Key::KEY_KPENTER => KeyboardEvent::Enter,
            Key::KEY_TAB => KeyboardEvent::Tab,
            Key::KEY_SPACE => KeyboardEvent::Space,
            _ if self.ctrl || self.alt || self.meta => KeyboardEvent::Other,
            _ => keymap
                .map_key(key, self.shift, self.caps_lock)
                .map_or(KeyboardEvent::Other, KeyboardEvent::Character),
        };
        Some(event)
    }
}

struct Dispatcher {
    handler: KeyHandler,
    keymap: KeyMap,
    state: ModifierState,
    monitored: HashSet<PathBuf>,
    tx: mpsc::Sender<Internal>,
    stopped: Arc<AtomicBool>,
}

impl Dispatcher {
    fn run(mut self, mut rx: mpsc::Receiver<Internal>) {
        log::debug!("Listener thread running");

        while let Some(message) = rx.blocking_recv() {
            if self.stopped.load(Ordering::Acquire) || !self.dispatch(message) {
                break;
            }
        }

        log::debug!("Listener thread stopped");
    }

    /// Handle one message; `false` means shut down
    fn dispatch(&mut self, message: Internal) -> bool {
        match message {
            Internal::Key(key, value) => {
                if let Some(event) = self.state.translate(key, value, &self.keymap) {
                    (self.handler)(event);
                }
            }
            Internal::DeviceAdded(path) => self.add_device(path),
            Internal::DeviceRemoved(path) => {
                if self.monitored.remove(&path) {
                    log::debug!("Stopped monitoring {:?}", path);
                }
            }
            Internal::Shutdown => return false,
        }
        true
    }

    /// Claim the path and open it off the listener thread
    ///
    /// The claim is released through `DeviceRemoved` if the node never
    /// becomes a readable keyboard, or later when its reader exits.
    fn add_device(&mut self, path: PathBuf) {
        if !self.monitored.insert(path.clone()) {
            return;
        }

        let tx = self.tx.clone();
        let stopped = self.stopped.clone();
        std::thread::spawn(move || {
            std::thread::sleep(SETTLE_DELAY);
            if stopped.load(Ordering::Acquire) {
                return;
            }

            match Device::open(&path) {
                Ok(device) if KeyboardMonitor::is_keyboard(&device) => {
                    log::info!(
                        "New keyboard detected: {} ({:?})",
                        device.name().unwrap_or("Unknown"),
                        path
                    );
                    spawn_reader(device, path, tx, stopped);
                }
                Ok(_) => {
                    let _ = tx.blocking_send(Internal::DeviceRemoved(path));
                }
                Err(e) => {
                    log::debug!("Failed to open new device {:?}: {}", path, e);
                    let _ = tx.blocking_send(Internal::DeviceRemoved(path));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESS: i32 = 1;
    const RELEASE: i32 = 0;
    const REPEAT: i32 = 2;

    #[test]
    fn test_translate_characters_and_shift() {
        let keymap = KeyMap::new("qwerty");
        let mut state = ModifierState::default();

        assert_eq!(
            state.translate(Key::KEY_SLASH, PRESS, &keymap),
            Some(KeyboardEvent::Character('/'))
        );
        assert_eq!(state.translate(Key::KEY_SLASH, RELEASE, &keymap), None);

        assert_eq!(
            state.translate(Key::KEY_LEFTSHIFT, PRESS, &keymap),
            Some(KeyboardEvent::Shift)
        );
        assert_eq!(state.translate(Key::KEY_LEFTSHIFT, REPEAT, &keymap), None);
        assert_eq!(
            state.translate(Key::KEY_H, PRESS, &keymap),
            Some(KeyboardEvent::Character('H'))
        );
        assert_eq!(state.translate(Key::KEY_LEFTSHIFT, RELEASE, &keymap), None);
        assert_eq!(
            state.translate(Key::KEY_H, PRESS, &keymap),
            Some(KeyboardEvent::Character('h'))
        );
    }

    #[test]
    fn test_translate_editing_keys_repeat() {
        let keymap = KeyMap::new("qwerty");
        let mut state = ModifierState::default();

        assert_eq!(
            state.translate(Key::KEY_BACKSPACE, REPEAT, &keymap),
            Some(KeyboardEvent::Backspace)
        );
        assert_eq!(
            state.translate(Key::KEY_LEFT, PRESS, &keymap),
            Some(KeyboardEvent::Left)
        );
        assert_eq!(
            state.translate(Key::KEY_DELETE, PRESS, &keymap),
            Some(KeyboardEvent::Delete)
        );
        assert_eq!(state.translate(Key::KEY_A, REPEAT, &keymap), None);
    }

    #[test]
    fn test_translate_terminators_and_chords() {
        let keymap = KeyMap::new("qwerty");
        let mut state = ModifierState::default();

        assert_eq!(
            state.translate(Key::KEY_SPACE, PRESS, &keymap),
            Some(KeyboardEvent::Space)
        );
        assert_eq!(
            state.translate(Key::KEY_KPENTER, PRESS, &keymap),
            Some(KeyboardEvent::Enter)
        );
        assert_eq!(
            state.translate(Key::KEY_LEFTCTRL, PRESS, &keymap),
            Some(KeyboardEvent::Control)
        );
        assert_eq!(
            state.translate(Key::KEY_C, PRESS, &keymap),
            Some(KeyboardEvent::Other)
        );
        state.translate(Key::KEY_LEFTCTRL, RELEASE, &keymap);
        assert_eq!(
            state.translate(Key::KEY_C, PRESS, &keymap),
            Some(KeyboardEvent::Character('c'))
        );
        assert_eq!(
            state.translate(Key::KEY_F5, PRESS, &keymap),
            Some(KeyboardEvent::Other)
        );
    }

    #[test]
    fn test_caps_lock_toggles() {
        let keymap = KeyMap::new("qwerty");
        let mut state = ModifierState::default();

        assert_eq!(state.translate(Key::KEY_CAPSLOCK, PRESS, &keymap), None);
        assert_eq!(
            state.translate(Key::KEY_A, PRESS, &keymap),
            Some(KeyboardEvent::Character('A'))
        );
        state.translate(Key::KEY_CAPSLOCK, PRESS, &keymap);
        assert_eq!(
            state.translate(Key::KEY_A, PRESS, &keymap),
            Some(KeyboardEvent::Character('a'))
        );
    }

    fn dispatcher(handler: KeyHandler) -> (Dispatcher, mpsc::Receiver<Internal>) {
        let (tx, rx) = mpsc::channel(16);
        let dispatcher = Dispatcher {
            handler,
            keymap: KeyMap::new("qwerty"),
            state: ModifierState::default(),
            monitored: HashSet::new(),
            tx,
            stopped: Arc::new(AtomicBool::new(false)),
        };
        (dispatcher, rx)
    }

    #[test]
    fn test_new_device_does_not_stall_keys() {
        let (seen_tx, seen_rx) = std::sync::mpsc::channel();
        let (dispatcher, rx) = dispatcher(Box::new(move |event| {
            let _ = seen_tx.send(event);
        }));
        let tx = dispatcher.tx.clone();
        let listener = std::thread::spawn(move || dispatcher.run(rx));

        let missing = tempfile::tempdir().unwrap().path().join("event99");
        tx.blocking_send(Internal::DeviceAdded(missing)).unwrap();
        tx.blocking_send(Internal::Key(Key::KEY_A, PRESS)).unwrap();

        // Well inside the settle delay
        let event = seen_rx.recv_timeout(SETTLE_DELAY / 5).unwrap();
        assert_eq!(event, KeyboardEvent::Character('a'));

        tx.blocking_send(Internal::Shutdown).unwrap();
        listener.join().unwrap();
    }

    #[test]
    fn test_removed_device_can_be_added_again() {
        let (mut dispatcher, mut rx) = dispatcher(Box::new(|_| {}));
        let path = tempfile::tempdir().unwrap().path().join("event7");

        assert!(dispatcher.dispatch(Internal::DeviceAdded(path.clone())));
        assert!(dispatcher.monitored.contains(&path));

        // A second create event for the same node is ignored while claimed
        assert!(dispatcher.dispatch(Internal::DeviceAdded(path.clone())));

        // The node cannot be opened, so the helper gives the claim back
        match rx.blocking_recv() {
            Some(Internal::DeviceRemoved(released)) => assert_eq!(released, path),
            other => panic!("Expected DeviceRemoved, got {:?}", other),
        }
        assert!(dispatcher.dispatch(Internal::DeviceRemoved(path.clone())));
        assert!(!dispatcher.monitored.contains(&path));

        // Replugged on the same node: claimed again
        assert!(dispatcher.dispatch(Internal::DeviceAdded(path.clone())));
        assert!(dispatcher.monitored.contains(&path));
        assert!(!dispatcher.dispatch(Internal::Shutdown));
    }

    #[test]
    fn test_event_node_names() {
        assert!(is_event_node(Path::new("/dev/input/event3")));
        assert!(!is_event_node(Path::new("/dev/input/mouse0")));
    }
}
