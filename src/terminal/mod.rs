//! PTY-backed shell sessions, keyed by client-supplied IDs.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use log::{info, warn};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;

const DEFAULT_ROWS: u16 = 24;
const DEFAULT_COLS: u16 = 80;

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("terminal session '{0}' already exists")]
    SessionExists(String),

    #[error("pty failure: {0}")]
    Pty(anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One shell attached to a pseudo-terminal. Bound 1:1 to a WebSocket for
/// its lifetime; destroyed when either end closes.
pub struct Session {
    pub id: String,
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    child: Mutex<Option<Box<dyn Child + Send + Sync>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

impl Session {
    fn spawn(id: &str) -> Result<Self, TerminalError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: DEFAULT_ROWS,
                cols: DEFAULT_COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(TerminalError::Pty)?;

        let mut cmd = CommandBuilder::new(default_shell());
        cmd.env("TERM", "xterm-256color");
        let child = pair.slave.spawn_command(cmd).map_err(TerminalError::Pty)?;
        drop(pair.slave);

        let writer = pair.master.take_writer().map_err(TerminalError::Pty)?;

        Ok(Self {
            id: id.to_string(),
            master: Mutex::new(pair.master),
            writer: Mutex::new(writer),
            child: Mutex::new(Some(child)),
        })
    }

    /// Clone the PTY master's read side. Each caller gets an independent
    /// blocking reader.
    pub fn clone_reader(&self) -> Result<Box<dyn Read + Send>, TerminalError> {
        self.master
            .lock()
            .unwrap()
            .try_clone_reader()
            .map_err(TerminalError::Pty)
    }

    /// Write bytes to the shell.
    pub fn write(&self, data: &[u8]) -> Result<(), TerminalError> {
        let mut writer = self.writer.lock().unwrap();
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    /// Set the PTY window size.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), TerminalError> {
        self.master
            .lock()
            .unwrap()
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(TerminalError::Pty)
    }

    /// Kill and reap the shell. Idempotent; safe from any thread.
    pub fn close(&self) {
        if let Some(mut child) = self.child.lock().unwrap().take() {
            if let Err(err) = child.kill() {
                warn!("terminal {}: kill failed: {err}", self.id);
            }
            let _ = child.wait();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Registry of live terminal sessions.
pub struct Registry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn a shell for `id`. An ID already in use is rejected; the
    /// caller picks a fresh one.
    pub fn create(&self, id: &str) -> Result<Arc<Session>, TerminalError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(id) {
            return Err(TerminalError::SessionExists(id.to_string()));
        }
        let session = Arc::new(Session::spawn(id)?);
        sessions.insert(id.to_string(), session.clone());
        info!("terminal session created: {id}");
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    /// Remove and close a session. A no-op for unknown IDs.
    pub fn close(&self, id: &str) {
        let session = self.sessions.lock().unwrap().remove(id);
        if let Some(session) = session {
            session.close();
            info!("terminal session closed: {id}");
        }
    }

    pub fn close_all(&self) {
        let sessions: Vec<Arc<Session>> = {
            let mut map = self.sessions.lock().unwrap();
            map.drain().map(|(_, s)| s).collect()
        };
        for session in sessions {
            session.close();
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn default_shell() -> String {
    if cfg!(windows) {
        return "powershell.exe".to_string();
    }
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}
