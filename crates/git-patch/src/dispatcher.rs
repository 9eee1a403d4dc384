//! Running the patch computation in a child process.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use git_utils::subprocess::{GitCommand, GitCommandResult};
use git_utils::UtilError;
use tracing::{debug, info, warn};

use crate::child::parse_action_line;
use crate::protocol;
use crate::settings::PatchSettings;
use crate::sink::{FileActionListener, PatchSink};
use crate::stream::PatchReader;
use crate::PatchError;

/// Environment variable carrying the child's memory limit in megabytes. The
/// limit itself is enforced on the child's address space.
pub const MEMORY_LIMIT_ENV: &str = "GITPATCH_MEMORY_LIMIT_MB";

const SIGKILL: i32 = 9;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// The `gitpatch` binary.
    pub program: PathBuf,
    /// Memory limits tried in order while the child runs out of memory.
    pub memory_limits_mb: Vec<u32>,
    pub idle_timeout: Duration,
    pub max_output: Option<usize>,
}

impl DispatcherConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        DispatcherConfig {
            program: program.into(),
            memory_limits_mb: vec![512, 1024, 2048],
            idle_timeout: Duration::from_secs(1800),
            max_output: None,
        }
    }
}

pub struct PatchDispatcher {
    config: DispatcherConfig,
}

fn out_of_memory(result: &GitCommandResult) -> bool {
    let stderr = String::from_utf8_lossy(&result.stderr);
    stderr.contains("out of memory")
        || stderr.contains("OutOfMemory")
        || stderr.contains("memory allocation of")
        || result.signal() == Some(SIGKILL)
}

impl PatchDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        PatchDispatcher { config }
    }

    /// Build the patch for `settings` in a child process and replay it into
    /// `sink`. The listener sees the child's file actions.
    pub fn build(
        &self,
        settings: &PatchSettings,
        sink: &mut dyn PatchSink,
        listener: &mut dyn FileActionListener,
    ) -> Result<(), PatchError> {
        info!(
            "Build patch in separate process, root: {}, fromRevision: {}, toRevision: {}",
            settings.root.url,
            settings.from_revision.as_deref().unwrap_or("<none>"),
            settings.to_revision
        );
        let mut last_attempted = None;
        for &limit in &self.config.memory_limits_mb {
            let patch_file = tempfile::Builder::new().prefix("git").suffix(".patch").tempfile()?;
            let mut child_settings = settings.clone();
            child_settings.patch_file = patch_file.path().to_path_buf();
            let input = protocol::encode(&child_settings.to_properties());

            let result = self.run_child(&settings.root.url, input, limit)?;
            if !result.success() {
                if out_of_memory(&result) {
                    warn!(limit_mb = limit, "git patch ran out of memory");
                    last_attempted = Some(limit);
                    continue;
                }
                return Err(PatchError::ProcessFailed {
                    status: result.status.to_string(),
                    stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
                });
            }

            for line in String::from_utf8_lossy(&result.stdout).lines() {
                match parse_action_line(line) {
                    Some((action, path)) => listener.file_action(action, path.into()),
                    None => debug!("git patch: {line}"),
                }
            }
            let file = File::open(patch_file.path())?;
            return PatchReader::new(BufReader::new(file))?.replay(sink);
        }
        Err(PatchError::OutOfMemory {
            last_attempted_mb: last_attempted.unwrap_or(0),
        })
    }

    fn run_child(&self, root: &str, input: String, limit_mb: u32) -> Result<GitCommandResult, PatchError> {
        let mut command = GitCommand::new(&self.config.program)
            .arg("build")
            .input(input)
            .env(MEMORY_LIMIT_ENV, limit_mb.to_string())
            .memory_limit(u64::from(limit_mb) * 1024 * 1024)
            .idle_timeout(self.config.idle_timeout);
        if let Some(max) = self.config.max_output {
            command = command.max_output(max);
        }
        command.run().map_err(|e| match e {
            UtilError::SubprocessIdle { idle, .. } => PatchError::ProcessIdle {
                root: root.to_string(),
                seconds: idle.as_secs(),
            },
            other => PatchError::Process(other),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use crate::rules::CheckoutRules;
    use crate::settings::RootSettings;
    use crate::sink::{FileAction, PatchAction, RecordingSink};
    use crate::stream::PatchWriter;
    use bstr::BStr;

    fn settings() -> PatchSettings {
        PatchSettings {
            from_revision: None,
            to_revision: "main".into(),
            rules: CheckoutRules::include_all(),
            caches_dir: PathBuf::from("/nonexistent"),
            patch_file: PathBuf::new(),
            uploaded_key: None,
            verbose_tree_walk: false,
            debug: false,
            root: RootSettings {
                url: "https://example.com/main.git".into(),
                ..RootSettings::default()
            },
        }
    }

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("gitpatch");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn replays_patch_written_by_child() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("fixture.patch");
        let mut writer = PatchWriter::new(Vec::new()).unwrap();
        writer.delete_directory(BStr::new("out")).unwrap();
        std::fs::write(&fixture, writer.finish().unwrap()).unwrap();

        // The child finds the patch file in its input and copies the fixture there.
        let program = script(
            dir.path(),
            &format!(
                "file=$(sed -n 's/^patcher\\.patchFile=//p')\ncp '{}' \"$file\"\necho 'DELETE out'\necho 'not an action'\necho 'log line' >&2",
                fixture.display()
            ),
        );
        let dispatcher = PatchDispatcher::new(DispatcherConfig::new(program));
        let mut sink = RecordingSink::new();
        let mut seen = Vec::new();
        let mut listener = |action: FileAction, path: &BStr| seen.push((action, path.to_string()));
        dispatcher.build(&settings(), &mut sink, &mut listener).unwrap();
        assert_eq!(seen, [(FileAction::Delete, "out".to_string())]);
        assert_eq!(sink.actions, [PatchAction::DeleteDirectory("out".into())]);
    }

    #[test]
    fn out_of_memory_exhausts_limits() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "echo \"limit $GITPATCH_MEMORY_LIMIT_MB: out of memory\" >&2; exit 3");
        let mut config = DispatcherConfig::new(program);
        config.memory_limits_mb = vec![64, 128];
        let err = PatchDispatcher::new(config)
            .build(&settings(), &mut RecordingSink::new(), &mut crate::sink::NoListener)
            .unwrap_err();
        assert!(matches!(err, PatchError::OutOfMemory { last_attempted_mb: 128 }));
    }

    #[test]
    fn larger_limit_is_tried_after_running_out_of_memory() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("fixture.patch");
        let mut writer = PatchWriter::new(Vec::new()).unwrap();
        writer.delete_file(BStr::new("a.txt")).unwrap();
        std::fs::write(&fixture, writer.finish().unwrap()).unwrap();

        // Stands in for a build that needs more than 256M of address space.
        let program = script(
            dir.path(),
            &format!(
                "if [ \"$(ulimit -v)\" -lt 262144 ]; then echo 'out of memory' >&2; exit 3; fi\nfile=$(sed -n 's/^patcher\\.patchFile=//p')\ncp '{}' \"$file\"",
                fixture.display()
            ),
        );
        let mut config = DispatcherConfig::new(program);
        config.memory_limits_mb = vec![64, 1024];
        let mut sink = RecordingSink::new();
        PatchDispatcher::new(config)
            .build(&settings(), &mut sink, &mut crate::sink::NoListener)
            .unwrap();
        assert_eq!(sink.actions, [PatchAction::DeleteFile("a.txt".into())]);
    }

    #[test]
    fn failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "echo 'commit is not found' >&2; exit 1");
        let err = PatchDispatcher::new(DispatcherConfig::new(program))
            .build(&settings(), &mut RecordingSink::new(), &mut crate::sink::NoListener)
            .unwrap_err();
        match err {
            PatchError::ProcessFailed { stderr, .. } => assert_eq!(stderr, "commit is not found"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn idle_child_is_reported_per_root() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "sleep 5");
        let mut config = DispatcherConfig::new(program);
        config.idle_timeout = Duration::from_millis(200);
        let err = PatchDispatcher::new(config)
            .build(&settings(), &mut RecordingSink::new(), &mut crate::sink::NoListener)
            .unwrap_err();
        assert!(matches!(err, PatchError::ProcessIdle { ref root, seconds: 0 } if root == "https://example.com/main.git"));
    }
}
