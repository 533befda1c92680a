// [apps/agent/src/crackers/support.rs]
//! Helpers de E/S compartidos por los adapters: nunca bloquean más allá
//! del deadline que su Cracker recibió del Brute Scanner.

use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::CheckOutcome;

/// Conecta por TCP respetando el tiempo restante hasta `deadline`.
pub async fn connect(host: &str, port: u16, deadline: Instant) -> Result<TcpStream, CheckOutcome> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(CheckOutcome::ConnectionFailed);
    }

    match tokio::time::timeout(remaining, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => Ok(stream),
        _ => Err(CheckOutcome::ConnectionFailed),
    }
}

pub async fn write_all(stream: &mut TcpStream, buf: &[u8], deadline: Instant) -> Result<(), CheckOutcome> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match tokio::time::timeout(remaining, stream.write_all(buf)).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(CheckOutcome::ConnectionFailed),
    }
}

/// Lee hasta `budget` bytes, acotado por el deadline; conexión cerrada sin
/// bytes se trata como fallo de red, no como protocolo desconocido.
pub async fn read_some(stream: &mut TcpStream, budget: usize, deadline: Instant) -> Result<Vec<u8>, CheckOutcome> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    let mut buf = vec![0u8; budget];

    match tokio::time::timeout(remaining, stream.read(&mut buf)).await {
        Ok(Ok(0)) => Err(CheckOutcome::ConnectionFailed),
        Ok(Ok(n)) => {
            buf.truncate(n);
            Ok(buf)
        }
        _ => Err(CheckOutcome::ConnectionFailed),
    }
}

pub async fn read_line(stream: &mut TcpStream, deadline: Instant) -> Result<String, CheckOutcome> {
    let bytes = read_some(stream, 1024, deadline).await?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.lines().next().unwrap_or_default().trim().to_string())
}
