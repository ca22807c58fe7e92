//! Redirection of the process stdout and stderr descriptors.
//!
//! While at least one terminal owner is registered, file descriptors 1 and 2
//! point at pipes, so anything the program writes there is intercepted:
//! `println!`, raw `io::stdout()` writes, other libraries, child processes that
//! inherit the descriptors. Drain passes [`collect`] what is waiting in the
//! pipes and hand it to the most recently registered owner. The original
//! descriptors are saved by the first registration and put back by the last.
//!
//! Only the owners' explicit capture handles are intercepted on targets
//! without unix file descriptors.

use super::owner::Stream;

/// Receiver of intercepted bytes.
pub(crate) trait CaptureTarget: Send + Sync {
    /// Takes `bytes` written to `stream`. Returns `false` if the target is not
    /// capturing, in which case they go to the real stream.
    fn accept(&self, stream: Stream, bytes: &[u8]) -> bool;
}

#[cfg(unix)]
pub(crate) use unix::{Registration, collect, register, terminal_fd};

#[cfg(not(unix))]
pub(crate) use fallback::{Registration, collect, register};

#[cfg(unix)]
mod unix {
    use std::io::{self, Write};
    use std::os::fd::OwnedFd;
    use std::sync::{Arc, Mutex, Weak};

    use nix::errno::Errno;
    use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl};
    use nix::unistd;

    use super::{CaptureTarget, Stream};
    use crate::Result;
    use crate::progress::lock::LockExt;

    type Targets = Vec<(usize, Weak<dyn CaptureTarget>)>;

    struct Stdio {
        redirect: Option<Redirect>,
        targets: Targets,
        next_id: usize,
    }

    static STDIO: Mutex<Stdio> = Mutex::new(Stdio {
        redirect: None,
        targets: Vec::new(),
        next_id: 0,
    });

    struct Redirect {
        saved_out: OwnedFd,
        saved_err: OwnedFd,
        out_reader: OwnedFd,
        err_reader: OwnedFd,
    }

    impl Redirect {
        fn install() -> Result<Self> {
            // color support is detected once, from the real streams
            let _ = (console::colors_enabled(), console::colors_enabled_stderr());
            io::stdout().flush()?;
            io::stderr().flush()?;
            let saved_out = cloexec(unistd::dup(io::stdout())?)?;
            let saved_err = cloexec(unistd::dup(io::stderr())?)?;
            let (out_reader, out_writer) = pipe()?;
            let (err_reader, err_writer) = pipe()?;
            unistd::dup2_stdout(&out_writer)?;
            if let Err(err) = unistd::dup2_stderr(&err_writer) {
                let _ = unistd::dup2_stdout(&saved_out);
                return Err(err.into());
            }
            Ok(Self {
                saved_out,
                saved_err,
                out_reader,
                err_reader,
            })
        }

        fn restore(&self) -> Result<()> {
            unistd::dup2_stdout(&self.saved_out)?;
            unistd::dup2_stderr(&self.saved_err)?;
            Ok(())
        }

        /// Moves everything waiting in the pipes to `target`, or to the real
        /// streams when there is none.
        fn pump(&self, target: Option<&Arc<dyn CaptureTarget>>) {
            let streams = [
                (Stream::Stdout, &self.out_reader, &self.saved_out),
                (Stream::Stderr, &self.err_reader, &self.saved_err),
            ];
            let mut buf = [0u8; 8192];
            for (stream, reader, saved) in streams {
                loop {
                    match unistd::read(reader, &mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            let bytes = &buf[..n];
                            if !target.is_some_and(|t| t.accept(stream, bytes)) {
                                write_all(saved, bytes);
                            }
                        }
                        Err(Errno::EINTR) => {}
                        // EAGAIN: the pipe is empty
                        Err(_) => break,
                    }
                }
            }
        }
    }

    fn pipe() -> Result<(OwnedFd, OwnedFd)> {
        let (reader, writer) = unistd::pipe()?;
        let flags = OFlag::from_bits_truncate(fcntl(&reader, FcntlArg::F_GETFL)?);
        fcntl(&reader, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
        Ok((cloexec(reader)?, writer))
    }

    fn cloexec(fd: OwnedFd) -> Result<OwnedFd> {
        fcntl(&fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
        Ok(fd)
    }

    fn write_all(fd: &OwnedFd, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            match unistd::write(fd, bytes) {
                Ok(0) => return,
                Ok(n) => bytes = &bytes[n..],
                Err(Errno::EINTR) => {}
                Err(_) => return,
            }
        }
    }

    fn latest(targets: &Targets) -> Option<Arc<dyn CaptureTarget>> {
        targets.iter().rev().find_map(|(_, target)| target.upgrade())
    }

    fn flush_std_streams() {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }

    /// Keeps a capture target registered until dropped.
    pub(crate) struct Registration {
        id: usize,
    }

    /// Registers `target`, redirecting the process streams if this is the
    /// first registration. If redirection fails the target is registered
    /// anyway and only its explicit handles capture.
    pub(crate) fn register(target: Weak<dyn CaptureTarget>) -> Registration {
        let mut failure = None;
        let id = {
            let mut stdio = STDIO.locked();
            if stdio.redirect.is_none() {
                match Redirect::install() {
                    Ok(redirect) => stdio.redirect = Some(redirect),
                    Err(err) => failure = Some(err),
                }
            }
            let id = stdio.next_id;
            stdio.next_id += 1;
            stdio.targets.push((id, target));
            id
        };
        if let Some(err) = failure {
            log::debug!("tickline: stdout/stderr not redirected: {err}");
        }
        Registration { id }
    }

    /// Hands everything waiting in the pipes to the most recently registered target.
    pub(crate) fn collect() {
        let stdio = STDIO.locked();
        if let Some(redirect) = &stdio.redirect {
            redirect.pump(latest(&stdio.targets).as_ref());
        }
    }

    /// A descriptor for the real terminal stream, valid whether or not the
    /// stream is currently redirected.
    pub(crate) fn terminal_fd(stream: Stream) -> Option<OwnedFd> {
        let stdio = STDIO.locked();
        let fd = match (&stdio.redirect, stream) {
            (Some(redirect), Stream::Stdout) => unistd::dup(&redirect.saved_out),
            (Some(redirect), Stream::Stderr) => unistd::dup(&redirect.saved_err),
            (None, Stream::Stdout) => unistd::dup(io::stdout()),
            (None, Stream::Stderr) => unistd::dup(io::stderr()),
        };
        fd.ok().and_then(|fd| cloexec(fd).ok())
    }

    impl Drop for Registration {
        fn drop(&mut self) {
            // outside the lock: a writer may be blocked on a full pipe
            flush_std_streams();
            let mut stdio = STDIO.locked();
            if let Some(redirect) = &stdio.redirect {
                redirect.pump(latest(&stdio.targets).as_ref());
            }
            stdio.targets.retain(|(id, _)| *id != self.id);
            if !stdio.targets.is_empty() {
                return;
            }
            let Some(redirect) = stdio.redirect.take() else {
                return;
            };
            let restored = redirect.restore();
            redirect.pump(None);
            drop(stdio);
            if let Err(err) = restored {
                log::warn!("tickline: could not restore stdout/stderr: {err}");
            }
        }
    }
}

#[cfg(not(unix))]
mod fallback {
    use std::sync::Weak;

    use super::CaptureTarget;

    pub(crate) struct Registration;

    pub(crate) fn register(_target: Weak<dyn CaptureTarget>) -> Registration {
        Registration
    }

    pub(crate) fn collect() {}
}
