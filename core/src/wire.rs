//! Engine-facing breakpoint records.
//!
//! These messages travel over the IPC channel between the agent and the
//! native debugger engine, protobuf-encoded between frame sentinels. Field
//! tags are shared with the engine and must not be renumbered.

/// A location-bound watch request plus, once hit, the captured state.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Breakpoint {
    /// Opaque identifier assigned by the control plane.
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub location: ::core::option::Option<SourceLocation>,
    /// Cleared to tell the engine to stop watching this breakpoint.
    #[prost(bool, tag = "3")]
    pub activated: bool,
    #[prost(message, repeated, tag = "4")]
    pub stack_frames: ::prost::alloc::vec::Vec<StackFrame>,
    /// Out-of-band shutdown signal from the engine.
    #[prost(bool, tag = "5")]
    pub kill_server: bool,
    #[prost(string, tag = "6")]
    pub condition: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "7")]
    pub expressions: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "8")]
    pub evaluated_expressions: ::prost::alloc::vec::Vec<Variable>,
    #[prost(message, optional, tag = "9")]
    pub status: ::core::option::Option<Status>,
    #[prost(bool, tag = "10")]
    pub log_point: bool,
    #[prost(string, tag = "11")]
    pub log_message_format: ::prost::alloc::string::String,
    #[prost(enumeration = "LogLevel", tag = "12")]
    pub log_level: i32,
    #[prost(bool, tag = "13")]
    pub is_final: bool,
    #[prost(message, optional, tag = "14")]
    pub create_time: ::core::option::Option<::prost_types::Timestamp>,
    #[prost(message, optional, tag = "15")]
    pub finalize_time: ::core::option::Option<::prost_types::Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SourceLocation {
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    /// 1-based line number.
    #[prost(int32, tag = "2")]
    pub line: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StackFrame {
    #[prost(string, tag = "1")]
    pub method_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub location: ::core::option::Option<SourceLocation>,
    #[prost(message, repeated, tag = "3")]
    pub arguments: ::prost::alloc::vec::Vec<Variable>,
    #[prost(message, repeated, tag = "4")]
    pub locals: ::prost::alloc::vec::Vec<Variable>,
}

/// A captured value. Members form a tree whose depth is bounded by the engine.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Variable {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub value: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub r#type: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "4")]
    pub members: ::prost::alloc::vec::Vec<Variable>,
    #[prost(message, optional, tag = "5")]
    pub status: ::core::option::Option<Status>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    #[prost(bool, tag = "1")]
    pub is_error: bool,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LogLevel {
    Info = 0,
    Warning = 1,
    Error = 2,
}

impl Breakpoint {
    /// A fresh active breakpoint at `path:line`.
    pub fn at(id: impl Into<String>, path: impl Into<String>, line: i32) -> Self {
        Self {
            id: id.into(),
            location: Some(SourceLocation {
                path: path.into(),
                line,
            }),
            activated: true,
            ..Default::default()
        }
    }

    /// The sentinel frame the engine sends when it shuts itself down.
    pub fn kill() -> Self {
        Self {
            kill_server: true,
            ..Default::default()
        }
    }

    /// Copy of this breakpoint with the activation flag cleared.
    pub fn tombstone(&self) -> Self {
        Self {
            activated: false,
            ..self.clone()
        }
    }

    /// Whether the engine reported an error for this breakpoint.
    pub fn has_error(&self) -> bool {
        self.status.as_ref().map(|s| s.is_error).unwrap_or(false)
    }
}
