//! EngineSpec - Launch configuration for the native debugger engine.

use std::ffi::OsString;
use std::path::PathBuf;

use debuglet_core::config::{EngineFeatures, Target};

/// Everything the engine needs on its command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSpec {
    /// Base path of the IPC sockets; the engine appends the channel suffixes
    pub pipe_name: PathBuf,

    /// Start a new application or attach to a running one
    pub target: Target,

    /// Optional evaluation features
    pub features: EngineFeatures,
}

impl EngineSpec {
    /// Engine command-line arguments.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--pipe-name".into(), self.pipe_name.clone().into()];

        match &self.target {
            Target::StartCommand(command) => {
                args.push("--application-start-command".into());
                args.push(command.into());
            }
            Target::AttachPid(pid) => {
                args.push("--application-id".into());
                args.push(pid.to_string().into());
            }
        }

        if self.features.property_evaluation {
            args.push("--property-evaluation".into());
        }
        if self.features.condition_evaluation {
            args.push("--condition-evaluation".into());
        }
        args
    }
}
