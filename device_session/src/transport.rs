//! The shell transport seam (§4.B). `Session` is generic over `ShellTransport` so that every
//! higher-level operation (prompt detection, XML collection, config-mode state machine) can be
//! exercised against [`ScriptedTransport`] without a network or an SSH server.

use std::io::Read;
use std::net::TcpStream;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ssh2::Channel;

/// A byte-oriented conversation with a device's interactive shell.
///
/// Implementors do not interpret prompts, sentinels, or ANSI escapes; that is `Session`'s job.
/// They only move bytes and know whether the remote end is still there.
pub trait ShellTransport {
    /// Writes `data` to the remote shell.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Returns whatever bytes are currently available without blocking for more.
    /// An empty result means "nothing new yet", not end-of-stream.
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Best-effort graceful shutdown. Errors are logged by the caller, never propagated.
    fn close(&mut self);
}

/// A real interactive shell over SSH, via `ssh2`.
pub struct Ssh2Transport {
    // Kept alive for the lifetime of `channel`; never read directly after construction.
    _session: ssh2::Session,
    _tcp: TcpStream,
    channel: Channel,
}

impl Ssh2Transport {
    pub fn connect(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let tcp = TcpStream::connect_timeout(
            &format!("{host}:{port}")
                .parse()
                .with_context(|| format!("invalid address {host}:{port}"))?,
            connect_timeout,
        )
        .with_context(|| format!("failed to open TCP connection to {host}:{port}"))?;
        tcp.set_read_timeout(Some(connect_timeout))?;

        let mut session = ssh2::Session::new().context("failed to create SSH session")?;
        session.set_tcp_stream(
            tcp.try_clone()
                .context("failed to clone TCP stream for SSH session")?,
        );
        session.handshake().context("SSH handshake failed")?;
        session
            .userauth_password(username, password)
            .context("SSH authentication failed")?;
        if !session.authenticated() {
            bail!("SSH authentication failed for {username}@{host}");
        }

        let mut channel = session.channel_session().context("failed to open SSH channel")?;
        channel
            .request_pty("vt100", None, None)
            .context("failed to request a pty")?;
        channel.shell().context("failed to start a remote shell")?;
        session.set_blocking(false);

        Ok(Ssh2Transport {
            _session: session,
            _tcp: tcp,
            channel,
        })
    }
}

impl ShellTransport for Ssh2Transport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        use std::io::Write;
        self.channel
            .write_all(data)
            .context("failed to write to SSH channel")?;
        self.channel.flush().context("failed to flush SSH channel")?;
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut buf = [0u8; 8192];
        let mut out = Vec::new();
        loop {
            match self.channel.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
                // non-blocking channel: `WouldBlock` just means "nothing more right now"
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e).context("failed to read from SSH channel"),
            }
        }
        Ok(out)
    }

    fn close(&mut self) {
        if let Err(e) = self.channel.close() {
            log::debug!("error closing SSH channel: {e}");
        }
    }
}

/// A scripted transport for tests: `writes` records what the caller sent, and `chunks` is drained
/// in order on each `read_available()` call, simulating a device that produces output gradually.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub writes: Vec<String>,
    pub chunks: std::collections::VecDeque<String>,
    pub closed: bool,
}

impl ScriptedTransport {
    pub fn new(chunks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ScriptedTransport {
            writes: Vec::new(),
            chunks: chunks.into_iter().map(Into::into).collect(),
            closed: false,
        }
    }

    /// Queues an additional chunk to be returned by a future `read_available()` call.
    pub fn push_chunk(&mut self, chunk: impl Into<String>) {
        self.chunks.push_back(chunk.into());
    }
}

impl ShellTransport for ScriptedTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writes.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        Ok(self.chunks.pop_front().unwrap_or_default().into_bytes())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
