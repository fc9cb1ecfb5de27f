//! Running commands and reading files inside a container.
//!
//! [`Executor`] is the seam between package-manager probes and the
//! container runtime. [`DockerExecutor`] drives the `docker` CLI; tests use
//! an in-memory implementation that serves tar archives.

mod docker;

use std::io::Read;

pub use docker::{DockerExecutor, DockerExecutorConfig};

use crate::error::ExecutorError;

/// Raw tar stream of a container directory, consumed incrementally.
pub type TarStream = Box<dyn Read + Send>;

/// Result of one command run inside the container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
    /// Exit status of the command.
    pub exit_code: i32,
}

impl ExecOutput {
    /// True when the command exited with status 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Access to a running container.
///
/// The caller owns the executor and must call [`Executor::close`] exactly
/// once when done with it.
#[expect(async_fn_in_trait, reason = "callers stay on one task; no Send bound needed")]
pub trait Executor: Send + Sync {
    /// Run `cmd` inside the container and wait for it to finish.
    async fn exec(&self, cmd: &[&str]) -> Result<ExecOutput, ExecutorError>;

    /// Contents of a single file inside the container.
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecutorError>;

    /// Tar stream of a directory inside the container.
    async fn read_dir(&self, path: &str) -> Result<TarStream, ExecutorError>;

    /// Stop the container. Idempotent.
    async fn close(&self) -> Result<(), ExecutorError>;
}

/// Content of the first regular entry of a tar archive.
pub(crate) fn first_tar_entry(archive: impl Read, path: &str) -> Result<Vec<u8>, ExecutorError> {
    let read_err = |source| ExecutorError::Read {
        path: path.to_owned(),
        source,
    };
    let mut ar = tar::Archive::new(archive);
    let mut entries = ar.entries().map_err(read_err)?;
    let mut entry = entries
        .next()
        .ok_or_else(|| {
            read_err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "empty archive",
            ))
        })?
        .map_err(read_err)?;
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).map_err(read_err)?;
    Ok(buf)
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory executor used by probe and artifact tests.

    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{ExecOutput, Executor, TarStream};
    use crate::error::ExecutorError;

    /// Serves files and directories from memory.
    #[derive(Debug, Default)]
    pub(crate) struct FakeExecutor {
        /// Binaries whose `--version` succeeds.
        pub(crate) binaries: Vec<String>,
        /// Files by absolute path.
        pub(crate) files: HashMap<String, Vec<u8>>,
        /// Directory tars by absolute path: entries as `(name, content)`.
        pub(crate) dirs: HashMap<String, Vec<(String, Vec<u8>)>>,
        pub(crate) closes: AtomicUsize,
        pub(crate) execs: Mutex<Vec<String>>,
    }

    impl FakeExecutor {
        pub(crate) fn with_binary(mut self, bin: &str) -> Self {
            self.binaries.push(bin.to_owned());
            self
        }

        pub(crate) fn with_file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
            self.files.insert(path.to_owned(), content.into());
            self
        }

        pub(crate) fn with_dir(mut self, path: &str, entries: &[(&str, &str)]) -> Self {
            self.dirs.insert(
                path.to_owned(),
                entries
                    .iter()
                    .map(|(n, c)| ((*n).to_owned(), c.as_bytes().to_vec()))
                    .collect(),
            );
            self
        }

        pub(crate) fn close_count(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    pub(crate) fn build_tar(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_slice())
                .expect("append tar entry");
        }
        builder.into_inner().expect("finish tar")
    }

    fn not_found(path: &str) -> ExecutorError {
        ExecutorError::Read {
            path: path.to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        }
    }

    impl Executor for FakeExecutor {
        async fn exec(&self, cmd: &[&str]) -> Result<ExecOutput, ExecutorError> {
            self.execs
                .lock()
                .expect("exec log lock")
                .push(cmd.join(" "));
            let found = cmd
                .first()
                .is_some_and(|bin| self.binaries.iter().any(|b| b == bin));
            Ok(ExecOutput {
                exit_code: if found { 0 } else { 127 },
                ..ExecOutput::default()
            })
        }

        async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecutorError> {
            self.files.get(path).cloned().ok_or_else(|| not_found(path))
        }

        async fn read_dir(&self, path: &str) -> Result<TarStream, ExecutorError> {
            let entries = self.dirs.get(path).ok_or_else(|| not_found(path))?;
            Ok(Box::new(Cursor::new(build_tar(entries))))
        }

        async fn close(&self) -> Result<(), ExecutorError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
