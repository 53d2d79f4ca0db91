use std::io;
use std::path::Path;

use tokio::net::{UnixListener, UnixStream};

pub async fn connect(path: &Path) -> io::Result<UnixStream> {
    UnixStream::connect(path).await
}

/// True when something is accepting on the socket. A dead daemon leaves the
/// file behind, so existence alone proves nothing.
pub async fn socket_alive(path: &Path) -> bool {
    UnixStream::connect(path).await.is_ok()
}

pub fn remove_stale_socket(path: &Path) -> io::Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

pub fn bind(path: &Path) -> io::Result<UnixListener> {
    UnixListener::bind(path)
}
