//! A single logical conversation with one device (§3 Session, §4.B).

use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use device_api::constants::{
    contains_error_marker, CMD_COMMIT, CMD_COMMIT_AND_EXIT, CMD_COMMIT_CHECK, CMD_CONFIGURE, CMD_EXIT,
    DEFAULT_PROMPT_TIMEOUT_SECS, DEFAULT_XML_TIMEOUT_SECS, XML_COLLECTION_MAX_RETRIES,
};
use device_api::error::{CoreError, ReportError, SessionError};
use device_api::model::Device;

use crate::ansi;
use crate::prompt;
use crate::transport::{ShellTransport, Ssh2Transport};

/// The result of an XML collection attempt: the sentinel may not have been observed within the
/// timeout, in which case `timed_out` is set and `output` holds whatever was gathered (§4.B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlCollection {
    pub output: String,
    pub timed_out: bool,
}

/// The outcome of a Stage-1 commit-check (§4.I).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitCheckOutcome {
    pub hard_error: bool,
    pub offending_command: Option<String>,
    pub check_output: String,
}

/// A single logical conversation with a device's interactive shell. Owns its `ShellTransport`
/// exclusively; there is never more than one command in flight.
pub struct Session<T: ShellTransport> {
    device_name: String,
    transport: T,
    connected_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    closed: bool,
}

impl Session<Ssh2Transport> {
    /// Opens a real SSH shell to `device`, drains its banner, and waits for a prompt baseline.
    #[track_caller]
    pub fn connect(device: &Device) -> Result<Self, CoreError> {
        let transport = Ssh2Transport::connect(
            &device.mgmt_address,
            device.port,
            &device.username,
            &device.password,
            Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS),
        )
        .map_err(|e| {
            CoreError::with_source(
                SessionError::Unreachable {
                    device: device.name.clone(),
                },
                e,
            )
        })?;
        Self::handshake(device.name.clone(), transport)
    }
}

impl<T: ShellTransport> Session<T> {
    /// Wraps an already-connected transport, draining its banner and establishing the prompt
    /// baseline. This is the seam tests attach a [`crate::transport::ScriptedTransport`] through.
    #[track_caller]
    pub fn handshake(device_name: impl Into<String>, transport: T) -> Result<Self, CoreError> {
        let device_name = device_name.into();
        let mut session = Session {
            device_name: device_name.clone(),
            transport,
            connected_at: Utc::now(),
            last_activity: Utc::now(),
            closed: false,
        };
        session.read_until_prompt(Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))?;
        Ok(session)
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    #[track_caller]
    fn guard_open(&self) -> Result<(), CoreError> {
        if self.closed {
            return Err(CoreError::new(SessionError::SessionClosed {
                device: self.device_name.clone(),
            }));
        }
        Ok(())
    }

    #[track_caller]
    fn write_line(&mut self, command: &str) -> Result<(), CoreError> {
        self.guard_open()?;
        let mut line = command.as_bytes().to_vec();
        line.push(b'\n');
        self.transport
            .write(&line)
            .structured(SessionError::SessionClosed {
                device: self.device_name.clone(),
            })?;
        self.last_activity = Utc::now();
        Ok(())
    }

    /// Reads chunks until `stop` returns true against the accumulated, ANSI-cleaned output, or
    /// `timeout` elapses.
    #[track_caller]
    fn read_until(
        &mut self,
        timeout: Duration,
        stop: impl Fn(&str) -> bool,
    ) -> (String, bool) {
        let deadline = Instant::now() + timeout;
        let mut acc = String::new();
        loop {
            match self.transport.read_available() {
                Ok(bytes) if !bytes.is_empty() => {
                    acc.push_str(&ansi::clean(&String::from_utf8_lossy(&bytes)));
                    if stop(&acc) {
                        return (acc, false);
                    }
                }
                Ok(_) => {
                    if Instant::now() >= deadline {
                        return (acc, true);
                    }
                    thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    log::debug!("read error on {}: {e}", self.device_name);
                    if Instant::now() >= deadline {
                        return (acc, true);
                    }
                    thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }

    #[track_caller]
    fn read_until_prompt(&mut self, timeout: Duration) -> Result<String, CoreError> {
        let (output, timed_out) = self.read_until(timeout, |acc| prompt::ends_with_prompt(acc));
        if timed_out {
            return Err(CoreError::new(SessionError::PromptTimeout {
                device: self.device_name.clone(),
            }));
        }
        self.last_activity = Utc::now();
        Ok(output)
    }

    /// Writes `command`, sleeps `wait`, then drains whatever is readable once. For short commands
    /// whose output arrives promptly and completely within `wait`.
    #[track_caller]
    pub fn send(&mut self, command: &str, wait: Duration) -> Result<String, CoreError> {
        self.write_line(command)?;
        thread::sleep(wait);
        let bytes = self
            .transport
            .read_available()
            .structured(SessionError::SessionClosed {
                device: self.device_name.clone(),
            })?;
        self.last_activity = Utc::now();
        Ok(ansi::clean(&String::from_utf8_lossy(&bytes)))
    }

    /// Writes `command`, then reads in a loop until a prompt character is observed at the end of
    /// the accumulated output, with a small settling delay to catch trailing bytes.
    #[track_caller]
    pub fn send_until_prompt(&mut self, command: &str, timeout: Duration) -> Result<String, CoreError> {
        self.write_line(command)?;
        let output = self.read_until_prompt(timeout)?;
        thread::sleep(Duration::from_millis(200));
        let (trailer, _) = self.read_until(Duration::from_millis(200), |_| false);
        Ok(output + &trailer)
    }

    /// Reads until the XML closing tag sentinel appears, retrying up to
    /// [`XML_COLLECTION_MAX_RETRIES`] times if it is not observed within `timeout`.
    #[track_caller]
    pub fn collect_xml(&mut self, command: &str, timeout: Duration) -> Result<XmlCollection, CoreError> {
        self.write_line(command)?;
        let mut acc = String::new();
        for attempt in 0..=XML_COLLECTION_MAX_RETRIES {
            let (chunk, timed_out) = self.read_until(timeout, |a| prompt::contains_xml_sentinel(a));
            acc.push_str(&chunk);
            if !timed_out {
                self.last_activity = Utc::now();
                return Ok(XmlCollection {
                    output: acc,
                    timed_out: false,
                });
            }
            log::debug!(
                "XML sentinel not observed on {} (attempt {}/{})",
                self.device_name,
                attempt + 1,
                XML_COLLECTION_MAX_RETRIES + 1
            );
        }
        self.last_activity = Utc::now();
        Ok(XmlCollection {
            output: acc,
            timed_out: true,
        })
    }

    /// Enters config mode, sends each command, checks each output for an error marker. On
    /// success, tries `commit and-exit` first, falling back to separate `commit`/`exit`. Returns
    /// `true` iff no error marker was seen anywhere and the final output indicates success. On
    /// any error marker, exits config mode without committing.
    #[track_caller]
    pub fn configure(&mut self, commands: &[String], commit: bool) -> Result<bool, CoreError> {
        self.send_until_prompt(CMD_CONFIGURE, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))?;

        for command in commands {
            let output = self.send_until_prompt(command, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))?;
            if contains_error_marker(&output) {
                self.send_until_prompt(CMD_EXIT, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))
                    .ok();
                return Ok(false);
            }
        }

        if !commit {
            let check = self.send_until_prompt(
                CMD_COMMIT_CHECK,
                Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS),
            )?;
            self.send_until_prompt(CMD_EXIT, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))?;
            return Ok(!contains_error_marker(&check));
        }

        let commit_and_exit =
            self.send_until_prompt(CMD_COMMIT_AND_EXIT, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))?;
        if indicates_commit_success(&commit_and_exit) {
            return Ok(true);
        }

        let commit_only = self.send_until_prompt(CMD_COMMIT, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))?;
        let exit_output = self.send_until_prompt(CMD_EXIT, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))?;
        Ok(indicates_commit_success(&commit_only) || indicates_commit_success(&exit_output))
    }

    /// Enters config mode, sends each command watching for an error marker. If one is observed,
    /// exits without committing and reports the offending command (§4.I Stage 1, "hard error").
    /// Otherwise runs `commit check` and exits without committing, returning its raw output so
    /// the caller can run drift detection against it.
    #[track_caller]
    pub fn commit_check(&mut self, commands: &[String]) -> Result<CommitCheckOutcome, CoreError> {
        self.send_until_prompt(CMD_CONFIGURE, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))?;

        for command in commands {
            let output = self.send_until_prompt(command, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))?;
            if contains_error_marker(&output) {
                self.send_until_prompt(CMD_EXIT, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))
                    .ok();
                return Ok(CommitCheckOutcome {
                    hard_error: true,
                    offending_command: Some(command.clone()),
                    check_output: output,
                });
            }
        }

        let check_output = self.send_until_prompt(
            CMD_COMMIT_CHECK,
            Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS),
        )?;
        self.send_until_prompt(CMD_EXIT, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))?;
        Ok(CommitCheckOutcome {
            hard_error: false,
            offending_command: None,
            check_output,
        })
    }

    /// Releases the shell.
    pub fn close(mut self) {
        self.closed = true;
        self.transport.close();
    }
}

fn indicates_commit_success(output: &str) -> bool {
    if contains_error_marker(output) {
        return false;
    }
    let lower = output.to_lowercase();
    lower.contains("commit") || lower.contains("completed") || lower.contains("exit")
}
