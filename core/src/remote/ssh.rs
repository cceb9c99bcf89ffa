use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ssh2::{ErrorCode, Session};
use tokio::task::spawn_blocking;
use tracing::{debug, trace};

use pifleet_common::error::{ConnectError, ExecError};
use pifleet_common::remote::{Connection, Credentials, ExecOutput, RemoteProbe};

// libssh2 error codes we tell apart.
const LIBSSH2_ERROR_SOCKET_SEND: i32 = -7;
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_SOCKET_DISCONNECT: i32 = -13;
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;
const LIBSSH2_ERROR_CHANNEL_CLOSED: i32 = -26;
const LIBSSH2_ERROR_SOCKET_RECV: i32 = -43;

/// Pause between polls when neither output stream has data.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Password-authenticated SSH sessions to players.
///
/// `ssh2` is blocking, so every call runs on tokio's blocking pool.
pub struct SshProbe {
    port: u16,
}

impl SshProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl Default for SshProbe {
    fn default() -> Self {
        Self::new(22)
    }
}

#[async_trait]
impl RemoteProbe for SshProbe {
    async fn open(
        &self,
        addr: Ipv4Addr,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, ConnectError> {
        let port = self.port;
        let credentials = credentials.clone();

        let session = spawn_blocking(move || connect(addr, port, &credentials, timeout))
            .await
            .map_err(|e| ConnectError::Handshake {
                addr,
                detail: e.to_string(),
            })??;

        debug!("SSH session open to {addr}:{port}");
        Ok(Box::new(SshConnection {
            peer: addr,
            session,
            closed: false,
        }))
    }
}

fn connect(
    addr: Ipv4Addr,
    port: u16,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<Session, ConnectError> {
    let socket_addr = SocketAddr::from((addr, port));
    let tcp = TcpStream::connect_timeout(&socket_addr, timeout).map_err(|e| match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ConnectError::Timeout { addr },
        _ => ConnectError::Unreachable {
            addr,
            detail: e.to_string(),
        },
    })?;

    let mut session = Session::new().map_err(|e| handshake_error(addr, e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(millis(timeout));
    session.handshake().map_err(|e| handshake_error(addr, e))?;

    session
        .userauth_password(&credentials.username, &credentials.password)
        .map_err(|e| match e.code() {
            ErrorCode::Session(LIBSSH2_ERROR_AUTHENTICATION_FAILED) => ConnectError::Auth {
                addr,
                user: credentials.username.clone(),
            },
            _ => handshake_error(addr, e),
        })?;

    if !session.authenticated() {
        return Err(ConnectError::Auth {
            addr,
            user: credentials.username.clone(),
        });
    }
    Ok(session)
}

fn handshake_error(addr: Ipv4Addr, err: ssh2::Error) -> ConnectError {
    match err.code() {
        ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => ConnectError::Timeout { addr },
        _ => ConnectError::Handshake {
            addr,
            detail: err.message().to_string(),
        },
    }
}

/// `0` means "no timeout" to libssh2, so never round down to it.
fn millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX).max(1)
}

/// One authenticated session. Cheap to clone internally; each `exec` opens a channel.
pub struct SshConnection {
    peer: Ipv4Addr,
    session: Session,
    closed: bool,
}

#[async_trait]
impl Connection for SshConnection {
    fn peer(&self) -> Ipv4Addr {
        self.peer
    }

    async fn exec(&mut self, command: &str, timeout: Duration) -> Result<ExecOutput, ExecError> {
        if self.closed {
            return Err(ExecError::Closed);
        }
        trace!("{} $ {command}", self.peer);

        let session = self.session.clone();
        let command = command.to_string();
        spawn_blocking(move || {
            session.set_timeout(millis(timeout));
            run(&session, &command, timeout)
        })
        .await
        .map_err(|e| ExecError::Failed(e.to_string()))?
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let session = self.session.clone();
        let peer = self.peer;
        let _ = spawn_blocking(move || {
            if let Err(e) = session.disconnect(None, "closing", None) {
                trace!("Disconnect from {peer} was not clean: {e}");
            }
        })
        .await;
    }
}

fn run(session: &Session, command: &str, timeout: Duration) -> Result<ExecOutput, ExecError> {
    let mut channel = session.channel_session().map_err(|e| match exec_error(e) {
        ExecError::Failed(detail) => ExecError::Channel(detail),
        other => other,
    })?;
    channel.exec(command).map_err(exec_error)?;

    // Both streams share one window; draining them in turn stalls a chatty stderr.
    session.set_blocking(false);
    let drained = drain(
        &mut channel.stream(0),
        &mut channel.stderr(),
        Instant::now() + timeout,
    );
    session.set_blocking(true);
    let (stdout, stderr) = drained?;

    channel.wait_close().map_err(exec_error)?;
    let exit_code = channel.exit_status().map_err(exec_error)?;

    Ok(ExecOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code,
    })
}

/// Reads two non-blocking streams side by side until both hit EOF or `deadline` passes.
fn drain(
    stdout: &mut impl Read,
    stderr: &mut impl Read,
    deadline: Instant,
) -> Result<(Vec<u8>, Vec<u8>), ExecError> {
    let mut buf = [0u8; 8192];
    let mut out = (Vec::new(), true);
    let mut err = (Vec::new(), true);

    while out.1 || err.1 {
        let moved = pull(stdout, &mut out, &mut buf)? | pull(stderr, &mut err, &mut buf)?;
        if !moved {
            if Instant::now() >= deadline {
                return Err(ExecError::Timeout);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
    Ok((out.0, err.0))
}

/// One read into `sink`. Returns whether anything happened, EOF included.
fn pull(
    source: &mut impl Read,
    (sink, open): &mut (Vec<u8>, bool),
    buf: &mut [u8],
) -> Result<bool, ExecError> {
    if !*open {
        return Ok(false);
    }
    match source.read(buf) {
        Ok(0) => {
            *open = false;
            Ok(true)
        }
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(true),
        Err(e) => Err(read_error(e)),
    }
}

fn exec_error(err: ssh2::Error) -> ExecError {
    match err.code() {
        ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => ExecError::Timeout,
        ErrorCode::Session(
            LIBSSH2_ERROR_SOCKET_SEND
            | LIBSSH2_ERROR_SOCKET_DISCONNECT
            | LIBSSH2_ERROR_CHANNEL_CLOSED
            | LIBSSH2_ERROR_SOCKET_RECV,
        ) => ExecError::Closed,
        _ => ExecError::Failed(err.message().to_string()),
    }
}

fn read_error(err: io::Error) -> ExecError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ExecError::Timeout,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => ExecError::Closed,
        _ => ExecError::Failed(err.to_string()),
    }
}
