use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::host::EngineHost;
use crate::traits::Duplex;

/// Open a raw byte stream to the engine (blocking until connected).
pub async fn connect(host: &EngineHost) -> Result<Box<dyn Duplex>> {
    match host {
        EngineHost::Unix { path } => connect_unix(host, path).await,
        EngineHost::Tcp {
            host: name,
            port,
        } => {
            let stream = TcpStream::connect((name.as_str(), *port))
                .await
                .map_err(|source| TransportError::Connect {
                    endpoint: host.to_string(),
                    source,
                })?;
            stream.set_nodelay(true)?;
            debug!(endpoint = %host, "connected to engine over tcp");
            Ok(Box::new(stream))
        }
    }
}

#[cfg(unix)]
async fn connect_unix(host: &EngineHost, path: &std::path::Path) -> Result<Box<dyn Duplex>> {
    let stream = UnixStream::connect(path)
        .await
        .map_err(|source| TransportError::Connect {
            endpoint: host.to_string(),
            source,
        })?;
    debug!(?path, "connected to engine unix socket");
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn connect_unix(host: &EngineHost, _path: &std::path::Path) -> Result<Box<dyn Duplex>> {
    Err(TransportError::Connect {
        endpoint: host.to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "unix domain sockets are not available on this platform",
        ),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    use super::*;

    fn sock_path(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ctrprims-connect-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("engine.sock")
    }

    #[tokio::test]
    async fn connect_unix_roundtrip() {
        let path = sock_path("ok");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"hello");
        });

        let mut stream = connect(&EngineHost::unix(&path)).await.unwrap();
        stream.write_all(b"hello").await.unwrap();
        server.await.unwrap();

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn connect_missing_socket_fails() {
        let path = sock_path("missing");
        let err = connect(&EngineHost::unix(&path)).await.err().unwrap();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(err.to_string().contains("unix://"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
