use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Client-side single-slot storage for the current session id.
///
/// Holds at most one id at a time; storing a new id replaces the old one.
#[derive(Debug)]
pub enum SessionSlot {
    Memory(Mutex<Option<String>>),
    File(PathBuf),
}

fn held(cell: &Mutex<Option<String>>) -> MutexGuard<'_, Option<String>> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionSlot {
    pub fn in_memory() -> Self {
        SessionSlot::Memory(Mutex::new(None))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        SessionSlot::File(path.into())
    }

    pub fn load(&self) -> Option<String> {
        match self {
            SessionSlot::Memory(cell) => held(cell).clone(),
            SessionSlot::File(path) => std::fs::read_to_string(path)
                .ok()
                .map(|raw| raw.trim().to_string())
                .filter(|id| !id.is_empty()),
        }
    }

    pub fn store(&self, id: &str) -> io::Result<()> {
        match self {
            SessionSlot::Memory(cell) => {
                *held(cell) = Some(id.to_string());
                Ok(())
            }
            SessionSlot::File(path) => std::fs::write(path, id),
        }
    }

    pub fn clear(&self) -> io::Result<()> {
        match self {
            SessionSlot::Memory(cell) => {
                *held(cell) = None;
                Ok(())
            }
            SessionSlot::File(path) => match std::fs::remove_file(path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_slot_holds_one_id() {
        let slot = SessionSlot::in_memory();
        assert_eq!(slot.load(), None);
        slot.store("a").unwrap();
        slot.store("b").unwrap();
        assert_eq!(slot.load().as_deref(), Some("b"));
        slot.clear().unwrap();
        assert_eq!(slot.load(), None);
    }

    #[test]
    fn memory_slot_survives_a_poisoned_lock() {
        let slot = std::sync::Arc::new(SessionSlot::in_memory());
        slot.store("a").unwrap();

        let poisoner = slot.clone();
        let _ = std::thread::spawn(move || {
            if let SessionSlot::Memory(cell) = poisoner.as_ref() {
                let _guard = cell.lock().unwrap();
                panic!("poison the slot");
            }
        })
        .join();

        assert_eq!(slot.load().as_deref(), Some("a"));
        slot.store("b").unwrap();
        assert_eq!(slot.load().as_deref(), Some("b"));
        slot.clear().unwrap();
        assert_eq!(slot.load(), None);
    }

    #[test]
    fn file_slot_survives_reopen_and_tolerates_missing_file() {
        let path = std::env::temp_dir().join(format!("boardroom_slot_{}", uuid::Uuid::new_v4()));
        let slot = SessionSlot::file(&path);
        assert_eq!(slot.load(), None);
        slot.clear().unwrap();

        slot.store("session-1").unwrap();
        assert_eq!(SessionSlot::file(&path).load().as_deref(), Some("session-1"));

        slot.clear().unwrap();
        assert_eq!(slot.load(), None);
    }
}
