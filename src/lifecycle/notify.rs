//! Supervisor readiness notifications.
//!
//! Best-effort, fire-and-forget messages in the `sd_notify(3)` format. A
//! supervisor that does not listen is unaffected.

use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;

/// Lifecycle state reported to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Ready,
    Reloading,
    Stopping,
}

impl ReadinessState {
    pub fn as_message(&self) -> &'static str {
        match self {
            ReadinessState::Ready => "READY=1",
            ReadinessState::Reloading => "RELOADING=1",
            ReadinessState::Stopping => "STOPPING=1",
        }
    }
}

/// Sink for readiness notifications. Implementations must never block for long
/// and never fail loudly.
pub trait ReadinessNotifier: Send + Sync {
    fn notify(&self, state: ReadinessState);
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ReadinessNotifier for NoopNotifier {
    fn notify(&self, _state: ReadinessState) {}
}

/// Sends notifications to the datagram socket named by `NOTIFY_SOCKET`.
#[derive(Debug, Clone)]
pub struct SystemdNotifier {
    socket_path: Option<PathBuf>,
}

impl SystemdNotifier {
    /// Read the socket path from the environment. Without `NOTIFY_SOCKET`
    /// every notification is a no-op.
    pub fn from_env() -> Self {
        Self {
            socket_path: std::env::var_os("NOTIFY_SOCKET").map(PathBuf::from),
        }
    }

    pub fn with_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: Some(path.into()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.socket_path.is_some()
    }

    fn send(&self, path: &std::path::Path, message: &str) -> std::io::Result<()> {
        let socket = UnixDatagram::unbound()?;
        let raw = path.as_os_str().as_encoded_bytes();

        if let Some(name) = raw.strip_prefix(b"@") {
            #[cfg(target_os = "linux")]
            {
                use std::os::linux::net::SocketAddrExt;
                let addr = std::os::unix::net::SocketAddr::from_abstract_name(name)?;
                socket.send_to_addr(message.as_bytes(), &addr)?;
                return Ok(());
            }
            #[cfg(not(target_os = "linux"))]
            {
                let _ = name;
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "abstract notify sockets require Linux",
                ));
            }
        }

        socket.send_to(message.as_bytes(), path)?;
        Ok(())
    }
}

impl ReadinessNotifier for SystemdNotifier {
    fn notify(&self, state: ReadinessState) {
        let Some(path) = self.socket_path.as_deref() else {
            return;
        };
        match self.send(path, state.as_message()) {
            Ok(()) => tracing::debug!(message = state.as_message(), "Supervisor notified"),
            Err(e) => tracing::debug!(
                message = state.as_message(),
                error = %e,
                "Supervisor notification dropped"
            ),
        }
    }
}
